//! What the image decoder and the packaging classifier hand to the engine.

use authentimed_types::{Factor, ScannerRole};
use serde::{Deserialize, Serialize};

/// One scan to evaluate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanInput {
    /// Decoded code string, as read from the image.
    pub code: String,
    /// Which code the caller claims was scanned.
    pub factor: Factor,
    /// The decoder's own validity flag. A rejected decode never reaches the
    /// state machine.
    #[serde(default = "default_true")]
    pub decode_valid: bool,
    /// Classifier verdict on the packaging image.
    pub ai_match: bool,
    /// Classifier confidence; recorded only.
    #[serde(default)]
    pub ai_confidence: Option<f32>,
    #[serde(default)]
    pub role: ScannerRole,
}

fn default_true() -> bool {
    true
}

impl ScanInput {
    pub fn new(code: impl Into<String>, factor: Factor, ai_match: bool) -> Self {
        Self {
            code: code.into(),
            factor,
            decode_valid: true,
            ai_match,
            ai_confidence: None,
            role: ScannerRole::Unspecified,
        }
    }

    pub fn with_role(mut self, role: ScannerRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.ai_confidence = Some(confidence);
        self
    }

    pub fn with_decode_valid(mut self, valid: bool) -> Self {
        self.decode_valid = valid;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let input: ScanInput =
            serde_json::from_str(r#"{"code":"Q1","factor":"strip","ai_match":true}"#).unwrap();
        assert_eq!(input, ScanInput::new("Q1", Factor::Strip, true));

        let full: ScanInput = serde_json::from_str(
            r#"{"code":"Q1","factor":"qr","ai_match":false,"decode_valid":false,"ai_confidence":0.4,"role":"pharmacist"}"#,
        )
        .unwrap();
        assert!(!full.decode_valid);
        assert_eq!(full.role, ScannerRole::Pharmacist);
    }
}
