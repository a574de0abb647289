//! Authentication factors, product verification states and verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two linked codes on a package was presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    /// The outer, publicly scannable QR code.
    Qr,
    /// The code embedded inside the package.
    Strip,
}

impl Factor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Strip => "strip",
        }
    }

    /// The other factor of the linked pair.
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Qr => Self::Strip,
            Self::Strip => Self::Qr,
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Factor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "qr" => Ok(Self::Qr),
            "strip" => Ok(Self::Strip),
            other => Err(format!("unknown factor '{other}', expected qr or strip")),
        }
    }
}

/// Lifecycle of a registered product. Only ever moves forward:
/// `Unverified -> Verified -> Replayed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    /// Registered, never scanned successfully.
    Unverified,
    /// Activated by a first genuine scan.
    Verified,
    /// The complementary factor was presented after activation. Terminal.
    Replayed,
}

impl VerificationState {
    fn rank(&self) -> u8 {
        match self {
            Self::Unverified => 0,
            Self::Verified => 1,
            Self::Replayed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    /// Staying in the same state is allowed.
    pub fn can_become(&self, next: VerificationState) -> bool {
        next.rank() >= self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Replayed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "UNVERIFIED",
            Self::Verified => "VERIFIED",
            Self::Replayed => "REPLAYED",
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final verdict shown to whoever presented a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// First-ever scan of a registered product.
    Genuine,
    /// Repeat scan through the factor that activated the product.
    Verified,
    /// Registered but never activated (status queries only).
    Unverified,
    /// Linked factor presented after activation.
    Replayed,
    /// Unknown code or rejected packaging.
    Counterfeit,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genuine => "GENUINE",
            Self::Verified => "VERIFIED",
            Self::Unverified => "UNVERIFIED",
            Self::Replayed => "REPLAYED",
            Self::Counterfeit => "COUNTERFEIT",
        }
    }

    /// Whether the verdict should raise a warning to the person scanning.
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Replayed | Self::Counterfeit)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed a scan. Recorded for the audit trail only; the state
/// machine treats every role the same.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerRole {
    Consumer,
    Pharmacist,
    #[default]
    Unspecified,
}

impl ScannerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Pharmacist => "pharmacist",
            Self::Unspecified => "unspecified",
        }
    }
}

impl FromStr for ScannerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consumer" => Ok(Self::Consumer),
            "pharmacist" => Ok(Self::Pharmacist),
            "unspecified" | "" => Ok(Self::Unspecified),
            other => Err(format!("unknown scanner role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_order_is_forward_only() {
        use VerificationState::*;
        assert!(Unverified.can_become(Verified));
        assert!(Verified.can_become(Replayed));
        assert!(Verified.can_become(Verified));
        assert!(!Verified.can_become(Unverified));
        assert!(!Replayed.can_become(Verified));
        assert!(!Replayed.can_become(Unverified));
        assert!(Replayed.is_terminal());
    }

    #[test]
    fn factor_parsing_and_counterpart() {
        assert_eq!("QR".parse::<Factor>().unwrap(), Factor::Qr);
        assert_eq!("strip".parse::<Factor>().unwrap(), Factor::Strip);
        assert!("barcode".parse::<Factor>().is_err());
        assert_eq!(Factor::Qr.counterpart(), Factor::Strip);
    }

    #[test]
    fn flagged_verdicts() {
        assert!(Verdict::Replayed.is_flagged());
        assert!(Verdict::Counterfeit.is_flagged());
        assert!(!Verdict::Genuine.is_flagged());
        assert!(!Verdict::Unverified.is_flagged());
    }
}
