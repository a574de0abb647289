//! Product records and the code identity store trait.

use crate::StoreError;
use authentimed_types::{Factor, ProductId, StripCode, Timestamp, VerificationState};
use serde::{Deserialize, Serialize};

/// One physical package instance, as held by the ledger.
///
/// The `product_id`/`strip_code` pairing is fixed at registration. Scan
/// history lives in the audit log; the product only keeps the first-scan
/// summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub strip_code: StripCode,
    pub registration_time: Timestamp,
    pub verification_state: VerificationState,
    /// Factor that activated the product. `None` while unverified.
    pub first_scan_factor: Option<Factor>,
    /// When the product was activated. `None` while unverified.
    pub first_scan_time: Option<Timestamp>,
}

impl Product {
    /// A freshly registered, never-scanned product.
    pub fn new(product_id: ProductId, strip_code: StripCode, registration_time: Timestamp) -> Self {
        Self {
            product_id,
            strip_code,
            registration_time,
            verification_state: VerificationState::Unverified,
            first_scan_factor: None,
            first_scan_time: None,
        }
    }

    /// Move an unverified product to `Verified`, recording the first scan.
    /// Returns `false` (and changes nothing) if the product was already activated.
    pub fn activate(&mut self, factor: Factor, at: Timestamp) -> bool {
        if self.verification_state != VerificationState::Unverified {
            return false;
        }
        self.verification_state = VerificationState::Verified;
        self.first_scan_factor = Some(factor);
        self.first_scan_time = Some(at);
        true
    }

    /// Move a verified product to `Replayed`.
    /// Returns `false` (and changes nothing) unless the product was `Verified`.
    pub fn mark_replayed(&mut self) -> bool {
        if self.verification_state != VerificationState::Verified {
            return false;
        }
        self.verification_state = VerificationState::Replayed;
        true
    }
}

/// Reject a product write that would break the ledger invariants: the
/// pairing and registration time never change, the state only moves
/// forward, and first-scan evidence is written once.
pub fn check_successor(prev: &Product, next: &Product) -> Result<(), StoreError> {
    let reject = |reason: &str| StoreError::InvalidTransition {
        product_id: prev.product_id.to_string(),
        reason: reason.to_string(),
    };

    if prev.product_id != next.product_id || prev.strip_code != next.strip_code {
        return Err(reject("code binding is immutable"));
    }
    if prev.registration_time != next.registration_time {
        return Err(reject("registration time is immutable"));
    }
    if !prev
        .verification_state
        .can_become(next.verification_state)
    {
        return Err(reject(&format!(
            "state cannot move from {} to {}",
            prev.verification_state, next.verification_state
        )));
    }
    if prev.first_scan_factor.is_some()
        && (prev.first_scan_factor != next.first_scan_factor
            || prev.first_scan_time != next.first_scan_time)
    {
        return Err(reject("first scan evidence is immutable"));
    }
    if next.verification_state != VerificationState::Unverified
        && (next.first_scan_factor.is_none() || next.first_scan_time.is_none())
    {
        return Err(reject("activated product is missing first scan evidence"));
    }
    Ok(())
}

/// Read access to the code identity store.
pub trait ProductStore {
    /// Look up a product by its QR identifier.
    fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Resolve a strip code to the product it is bound to.
    fn product_for_strip(&self, strip: &StripCode) -> Result<Option<ProductId>, StoreError>;

    /// Number of registered products.
    fn product_count(&self) -> Result<u64, StoreError>;

    fn contains_product(&self, product_id: &ProductId) -> Result<bool, StoreError> {
        self.get_product(product_id).map(|p| p.is_some())
    }

    fn contains_strip(&self, strip: &StripCode) -> Result<bool, StoreError> {
        self.product_for_strip(strip).map(|p| p.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authentimed_types::CodeFormat;

    fn product() -> Product {
        Product::new(
            ProductId::parse("Q1", CodeFormat::Permissive).unwrap(),
            StripCode::parse("S1", CodeFormat::Permissive).unwrap(),
            Timestamp::new(10),
        )
    }

    #[test]
    fn activation_happens_once() {
        let mut p = product();
        assert!(p.activate(Factor::Qr, Timestamp::new(20)));
        assert!(!p.activate(Factor::Strip, Timestamp::new(30)));
        assert_eq!(p.first_scan_factor, Some(Factor::Qr));
        assert_eq!(p.first_scan_time, Some(Timestamp::new(20)));
    }

    #[test]
    fn replay_requires_verified() {
        let mut p = product();
        assert!(!p.mark_replayed());
        p.activate(Factor::Strip, Timestamp::new(20));
        assert!(p.mark_replayed());
        assert!(!p.mark_replayed());
        assert_eq!(p.verification_state, VerificationState::Replayed);
    }

    #[test]
    fn successor_checks() {
        let prev = product();
        let mut next = prev.clone();
        next.activate(Factor::Qr, Timestamp::new(20));
        assert!(check_successor(&prev, &next).is_ok());

        // Regression is refused.
        assert!(check_successor(&next, &prev).is_err());

        // Rebinding the strip is refused.
        let mut rebound = next.clone();
        rebound.strip_code = StripCode::parse("S2", CodeFormat::Permissive).unwrap();
        assert!(check_successor(&next, &rebound).is_err());

        // Rewriting first-scan evidence is refused.
        let mut rewritten = next.clone();
        rewritten.first_scan_factor = Some(Factor::Strip);
        assert!(check_successor(&next, &rewritten).is_err());
    }
}
