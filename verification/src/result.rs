//! Typed verification outcomes and their flat report form.

use authentimed_types::{Factor, ProductId, StripCode, Timestamp, Verdict};
use serde::{Deserialize, Serialize};

/// Why a scan was judged counterfeit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterfeitReason {
    /// No product answers to the presented code.
    NotRegistered,
    /// The packaging classifier rejected the image.
    VisualMismatch,
}

impl CounterfeitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRegistered => "code not registered",
            Self::VisualMismatch => "visual mismatch",
        }
    }
}

/// Outcome of evaluating one scan (or a status query).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationResult {
    /// First scan of a registered product; it is now activated.
    Genuine {
        product_id: ProductId,
        strip_code: StripCode,
        factor: Factor,
        first_scan_time: Timestamp,
    },
    /// The product is activated and has not been replayed. A scan only
    /// lands here when it repeats the activating factor; a status query
    /// reports it for either factor.
    Verified {
        product_id: ProductId,
        strip_code: StripCode,
        factor: Factor,
        first_scan_factor: Factor,
        first_scan_time: Timestamp,
    },
    /// Registered but never scanned. Only produced by status queries.
    Unverified {
        product_id: ProductId,
        strip_code: StripCode,
        factor: Factor,
    },
    /// The product was activated through the other factor. Carries the
    /// original activation evidence.
    Replayed {
        product_id: ProductId,
        strip_code: StripCode,
        factor: Factor,
        first_scan_factor: Factor,
        first_scan_time: Timestamp,
    },
    Counterfeit {
        /// The normalised code as presented.
        code: String,
        factor: Factor,
        reason: CounterfeitReason,
        /// Set when the code matched a product but the image did not.
        product_id: Option<ProductId>,
    },
}

impl VerificationResult {
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Genuine { .. } => Verdict::Genuine,
            Self::Verified { .. } => Verdict::Verified,
            Self::Unverified { .. } => Verdict::Unverified,
            Self::Replayed { .. } => Verdict::Replayed,
            Self::Counterfeit { .. } => Verdict::Counterfeit,
        }
    }

    /// The factor the caller presented.
    pub fn factor(&self) -> Factor {
        match self {
            Self::Genuine { factor, .. }
            | Self::Verified { factor, .. }
            | Self::Unverified { factor, .. }
            | Self::Replayed { factor, .. }
            | Self::Counterfeit { factor, .. } => *factor,
        }
    }

    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::Genuine { product_id, .. }
            | Self::Verified { product_id, .. }
            | Self::Unverified { product_id, .. }
            | Self::Replayed { product_id, .. } => Some(product_id),
            Self::Counterfeit { product_id, .. } => product_id.as_ref(),
        }
    }

    pub fn strip_code(&self) -> Option<&StripCode> {
        match self {
            Self::Genuine { strip_code, .. }
            | Self::Verified { strip_code, .. }
            | Self::Unverified { strip_code, .. }
            | Self::Replayed { strip_code, .. } => Some(strip_code),
            Self::Counterfeit { .. } => None,
        }
    }

    /// Factor and time of the scan that activated the product.
    pub fn first_scan(&self) -> Option<(Factor, Timestamp)> {
        match self {
            Self::Genuine {
                factor,
                first_scan_time,
                ..
            } => Some((*factor, *first_scan_time)),
            Self::Verified {
                first_scan_factor,
                first_scan_time,
                ..
            }
            | Self::Replayed {
                first_scan_factor,
                first_scan_time,
                ..
            } => Some((*first_scan_factor, *first_scan_time)),
            Self::Unverified { .. } | Self::Counterfeit { .. } => None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.verdict().is_flagged()
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Genuine { .. } => "first scan, product activated".to_string(),
            Self::Verified {
                first_scan_factor, ..
            } => format!("already verified via {first_scan_factor}"),
            Self::Unverified { .. } => "not yet verified".to_string(),
            Self::Replayed {
                first_scan_factor,
                first_scan_time,
                ..
            } => format!(
                "linked factor already verified via {first_scan_factor} at {}",
                first_scan_time.as_secs()
            ),
            Self::Counterfeit { reason, .. } => reason.as_str().to_string(),
        }
    }

    /// Status of the code paired with the one presented.
    pub fn linked(&self) -> Option<String> {
        if matches!(self, Self::Counterfeit { .. }) {
            return None;
        }
        let counterpart = self.factor().counterpart();
        let status = match self.first_scan() {
            Some((factor, at)) if factor == counterpart => {
                format!("verified at {}", at.as_secs())
            }
            _ => "not scanned".to_string(),
        };
        Some(format!("{counterpart}: {status}"))
    }

    /// Flatten into the report rendered for the service layer.
    ///
    /// The strip code is only echoed back when it was the code presented, so
    /// a QR scan never discloses the hidden code.
    pub fn to_report(&self) -> VerificationReport {
        let flag = match self.verdict() {
            Verdict::Replayed => Some("REPLAY DETECTED".to_string()),
            Verdict::Counterfeit => Some("COUNTERFEIT SUSPECTED".to_string()),
            _ => None,
        };
        let strip_code = match self.factor() {
            Factor::Strip => self.strip_code().map(|s| s.to_string()),
            Factor::Qr => None,
        };
        VerificationReport {
            final_verdict: self.verdict(),
            product_id: self.product_id().map(|p| p.to_string()),
            strip_code,
            reason: self.reason(),
            linked: self.linked(),
            factor: self.factor(),
            first_scan_time: self.first_scan().map(|(_, at)| at.as_secs()),
            flag,
        }
    }
}

/// Flat rendering of a [`VerificationResult`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    #[serde(rename = "Final Verdict")]
    pub final_verdict: Verdict,
    #[serde(rename = "Product ID", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(rename = "Strip code", skip_serializing_if = "Option::is_none")]
    pub strip_code: Option<String>,
    #[serde(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "Linked", skip_serializing_if = "Option::is_none")]
    pub linked: Option<String>,
    #[serde(rename = "Factor")]
    pub factor: Factor,
    /// Unix seconds.
    #[serde(rename = "First Scan Time", skip_serializing_if = "Option::is_none")]
    pub first_scan_time: Option<u64>,
    #[serde(rename = "Flag", skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use authentimed_types::CodeFormat;

    fn ids() -> (ProductId, StripCode) {
        (
            ProductId::parse("Q1", CodeFormat::Permissive).unwrap(),
            StripCode::parse("S1", CodeFormat::Permissive).unwrap(),
        )
    }

    #[test]
    fn replay_reason_names_first_factor_and_time() {
        let (product_id, strip_code) = ids();
        let result = VerificationResult::Replayed {
            product_id,
            strip_code,
            factor: Factor::Strip,
            first_scan_factor: Factor::Qr,
            first_scan_time: Timestamp::new(1_000),
        };
        assert_eq!(
            result.reason(),
            "linked factor already verified via qr at 1000"
        );
        assert_eq!(result.linked().as_deref(), Some("qr: verified at 1000"));
        assert!(result.is_flagged());
    }

    #[test]
    fn report_field_names() {
        let (product_id, strip_code) = ids();
        let report = VerificationResult::Genuine {
            product_id,
            strip_code,
            factor: Factor::Qr,
            first_scan_time: Timestamp::new(5),
        }
        .to_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["Final Verdict"], "GENUINE");
        assert_eq!(json["Product ID"], "Q1");
        assert_eq!(json["Factor"], "qr");
        assert_eq!(json["First Scan Time"], 5);
        assert_eq!(json["Linked"], "strip: not scanned");
        assert!(json.get("Strip code").is_none());
        assert!(json.get("Flag").is_none());
    }

    #[test]
    fn counterfeit_report_is_flagged_without_product() {
        let report = VerificationResult::Counterfeit {
            code: "UNKNOWN".into(),
            factor: Factor::Qr,
            reason: CounterfeitReason::NotRegistered,
            product_id: None,
        }
        .to_report();
        assert_eq!(report.final_verdict, Verdict::Counterfeit);
        assert_eq!(report.reason, "code not registered");
        assert_eq!(report.flag.as_deref(), Some("COUNTERFEIT SUSPECTED"));
        assert!(report.product_id.is_none());
        assert!(report.linked.is_none());
    }

    #[test]
    fn strip_scan_echoes_strip_code() {
        let (product_id, strip_code) = ids();
        let report = VerificationResult::Verified {
            product_id,
            strip_code,
            factor: Factor::Strip,
            first_scan_factor: Factor::Strip,
            first_scan_time: Timestamp::new(5),
        }
        .to_report();
        assert_eq!(report.strip_code.as_deref(), Some("S1"));
        assert_eq!(report.reason, "already verified via strip");
        assert_eq!(report.linked.as_deref(), Some("qr: not scanned"));
    }

    #[test]
    fn verified_through_the_other_factor_names_it_as_linked() {
        let (product_id, strip_code) = ids();
        let report = VerificationResult::Verified {
            product_id,
            strip_code,
            factor: Factor::Strip,
            first_scan_factor: Factor::Qr,
            first_scan_time: Timestamp::new(100),
        }
        .to_report();
        assert_eq!(report.final_verdict, Verdict::Verified);
        assert_eq!(report.reason, "already verified via qr");
        assert_eq!(report.linked.as_deref(), Some("qr: verified at 100"));
        assert_eq!(report.first_scan_time, Some(100));
        assert!(report.flag.is_none());
    }
}
