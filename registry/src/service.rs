//! Registration service: quorum check, then one atomic insert.

use std::collections::BTreeSet;
use std::sync::Arc;

use authentimed_store::{LedgerStore, Product, RegistrationRecord, StoreError};
use authentimed_types::{Clock, CodeFormat, ProductId, StripCode, ValidatorAddress};

use crate::approval::ValidatorApproval;
use crate::error::RegistrationError;
use crate::validator_set::ValidatorSet;

pub struct RegistrationService<S: LedgerStore> {
    store: Arc<S>,
    validators: Arc<ValidatorSet>,
    clock: Arc<dyn Clock>,
    format: CodeFormat,
}

impl<S: LedgerStore> RegistrationService<S> {
    pub fn new(
        store: Arc<S>,
        validators: Arc<ValidatorSet>,
        clock: Arc<dyn Clock>,
        format: CodeFormat,
    ) -> Self {
        Self {
            store,
            validators,
            clock,
            format,
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Admit a new product.
    ///
    /// Checks run in this order: code syntax, approver membership, quorum,
    /// then uniqueness of both codes inside the storage transaction. On
    /// success the product is stored UNVERIFIED together with its
    /// registration entry.
    pub fn register(
        &self,
        product_id: &str,
        strip_code: &str,
        approvals: &[ValidatorApproval],
    ) -> Result<Product, RegistrationError> {
        let product_id = ProductId::parse(product_id, self.format).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "product_id",
                source,
            }
        })?;
        let strip_code = StripCode::parse(strip_code, self.format).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "strip_code",
                source,
            }
        })?;

        let approvers = self.count_approvals(&product_id, &strip_code, approvals)?;
        let need = self.validators.quorum();
        if approvers.len() < need {
            tracing::warn!(
                product_id = %product_id,
                have = approvers.len(),
                need,
                "registration rejected: quorum not met"
            );
            return Err(RegistrationError::QuorumNotMet {
                have: approvers.len(),
                need,
            });
        }

        let now = self.clock.now();
        let product = Product::new(product_id.clone(), strip_code.clone(), now);
        let record = RegistrationRecord {
            product_id,
            strip_code,
            timestamp: now,
            approvers: approvers.into_iter().collect(),
        };

        let committed = self
            .store
            .commit_registration(&product, &record)
            .map_err(|e| match e {
                StoreError::DuplicateProductId(id) => RegistrationError::DuplicateProductId(id),
                StoreError::DuplicateStripCode(code) => RegistrationError::DuplicateStripCode(code),
                other => {
                    tracing::error!(error = %other, "registration commit failed");
                    RegistrationError::Storage(other)
                }
            })?;

        tracing::info!(
            product_id = %product.product_id,
            strip_code = %product.strip_code,
            approvers = record.approvers.len(),
            seq = committed.seq,
            "product registered"
        );
        Ok(Product {
            registration_time: committed.timestamp,
            ..product
        })
    }

    /// Distinct validators with a valid signature over the pairing.
    ///
    /// An approval from outside the set fails the whole request. A bad
    /// signature from a member is dropped and logged.
    fn count_approvals(
        &self,
        product_id: &ProductId,
        strip_code: &StripCode,
        approvals: &[ValidatorApproval],
    ) -> Result<BTreeSet<ValidatorAddress>, RegistrationError> {
        let mut approvers = BTreeSet::new();
        for approval in approvals {
            let Some(key) = self.validators.public_key(&approval.validator) else {
                tracing::warn!(validator = %approval.validator, "approval from unknown validator");
                return Err(RegistrationError::UnknownValidator(
                    approval.validator.to_string(),
                ));
            };
            if !approval.verifies(product_id, strip_code, key) {
                tracing::warn!(
                    validator = %approval.validator,
                    product_id = %product_id,
                    "ignoring approval with invalid signature"
                );
                continue;
            }
            approvers.insert(approval.validator.clone());
        }
        Ok(approvers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authentimed_crypto::{derive_address, keypair_from_seed};
    use authentimed_nullables::{NullClock, NullStore};
    use authentimed_store::{AuditEvent, AuditStore, ProductStore};
    use authentimed_types::{KeyPair, Signature, VerificationState};

    struct Fixture {
        keys: Vec<KeyPair>,
        store: Arc<NullStore>,
        service: RegistrationService<NullStore>,
    }

    fn fixture() -> Fixture {
        let keys: Vec<KeyPair> = (1..=3).map(|i| keypair_from_seed(&[i; 32])).collect();
        let set = ValidatorSet::new(keys.iter().map(|k| derive_address(&k.public))).unwrap();
        let store = Arc::new(NullStore::new());
        let service = RegistrationService::new(
            store.clone(),
            Arc::new(set),
            Arc::new(NullClock::new(1_000)),
            CodeFormat::Permissive,
        );
        Fixture {
            keys,
            store,
            service,
        }
    }

    fn approvals(keys: &[KeyPair], p: &str, s: &str) -> Vec<ValidatorApproval> {
        let p = ProductId::parse(p, CodeFormat::Permissive).unwrap();
        let s = StripCode::parse(s, CodeFormat::Permissive).unwrap();
        keys.iter().map(|k| ValidatorApproval::sign(&p, &s, k)).collect()
    }

    #[test]
    fn one_of_three_is_not_enough() {
        let f = fixture();
        let err = f
            .service
            .register("Q1", "S1", &approvals(&f.keys[..1], "Q1", "S1"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::QuorumNotMet { have: 1, need: 2 }));
        assert_eq!(f.store.product_count().unwrap(), 0);
        assert_eq!(f.store.audit_len().unwrap(), 0);
    }

    #[test]
    fn two_of_three_registers() {
        let f = fixture();
        let product = f
            .service
            .register("q1", "s1", &approvals(&f.keys[..2], "Q1", "S1"))
            .unwrap();
        assert_eq!(product.product_id.as_str(), "Q1");
        assert_eq!(product.verification_state, VerificationState::Unverified);
        assert_eq!(product.registration_time.as_secs(), 1_000);

        let history = f.store.product_history(&product.product_id).unwrap();
        match &history[0].event {
            AuditEvent::Registration(r) => assert_eq!(r.approvers.len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn repeated_approval_counts_once() {
        let f = fixture();
        let mut list = approvals(&f.keys[..1], "Q1", "S1");
        list.push(list[0].clone());
        let err = f.service.register("Q1", "S1", &list).unwrap_err();
        assert!(matches!(err, RegistrationError::QuorumNotMet { have: 1, .. }));
    }

    #[test]
    fn bad_signature_is_ignored() {
        let f = fixture();
        let mut list = approvals(&f.keys[..2], "Q1", "S1");
        list[1].signature = Signature([7; 64]);
        let err = f.service.register("Q1", "S1", &list).unwrap_err();
        assert!(matches!(err, RegistrationError::QuorumNotMet { have: 1, .. }));
    }

    #[test]
    fn approval_for_a_different_pair_does_not_count() {
        let f = fixture();
        let list = approvals(&f.keys[..2], "Q1", "S2");
        assert!(f.service.register("Q1", "S1", &list).is_err());
    }

    #[test]
    fn outsider_is_refused() {
        let f = fixture();
        let outsider = keypair_from_seed(&[9; 32]);
        let mut list = approvals(&f.keys, "Q1", "S1");
        list.extend(approvals(std::slice::from_ref(&outsider), "Q1", "S1"));
        let err = f.service.register("Q1", "S1", &list).unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownValidator(_)));
        assert_eq!(f.store.product_count().unwrap(), 0);
    }

    #[test]
    fn duplicates_leave_store_unchanged() {
        let f = fixture();
        f.service
            .register("Q1", "S1", &approvals(&f.keys, "Q1", "S1"))
            .unwrap();

        let err = f
            .service
            .register("Q1", "S9", &approvals(&f.keys, "Q1", "S9"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateProductId(_)));

        let err = f
            .service
            .register("Q9", "S1", &approvals(&f.keys, "Q9", "S1"))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateStripCode(_)));

        assert_eq!(f.store.product_count().unwrap(), 1);
        assert_eq!(f.store.audit_len().unwrap(), 1);
    }

    #[test]
    fn malformed_codes_are_client_errors() {
        let f = fixture();
        let err = f.service.register("Q?1", "S1", &[]).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::MalformedCode { field: "product_id", .. }
        ));
        let err = f.service.register("Q1", "", &[]).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::MalformedCode { field: "strip_code", .. }
        ));
    }

    #[test]
    fn storage_failure_is_fatal() {
        let f = fixture();
        f.store.fail_commits(true);
        let err = f
            .service
            .register("Q1", "S1", &approvals(&f.keys, "Q1", "S1"))
            .unwrap_err();
        assert_eq!(err.kind(), authentimed_types::ErrorKind::Fatal);
        assert_eq!(f.store.product_count().unwrap(), 0);
    }
}
