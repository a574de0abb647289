//! Registration against the LMDB backend.

use std::sync::Arc;

use authentimed_crypto::{derive_address, keypair_from_seed};
use authentimed_nullables::{NullClock, NullRandom};
use authentimed_registry::{
    CodeGenerator, RegistrationError, RegistrationService, ValidatorApproval, ValidatorSet,
};
use authentimed_store::{AuditEvent, AuditStore, ProductStore};
use authentimed_store_lmdb::LmdbEnvironment;
use authentimed_types::{CodeFormat, KeyPair};
use proptest::prelude::*;

const MAP_SIZE: usize = 10 * 1024 * 1024;

fn validators() -> (Vec<KeyPair>, Arc<ValidatorSet>) {
    let keys: Vec<KeyPair> = (1..=3).map(|i| keypair_from_seed(&[i; 32])).collect();
    let set = ValidatorSet::new(keys.iter().map(|k| derive_address(&k.public))).unwrap();
    (keys, Arc::new(set))
}

fn service(env: Arc<LmdbEnvironment>, set: Arc<ValidatorSet>) -> RegistrationService<LmdbEnvironment> {
    RegistrationService::new(env, set, Arc::new(NullClock::new(500)), CodeFormat::Pan)
}

#[test]
fn generated_pair_registers_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let (keys, set) = validators();
    let (product_id, strip_code) = {
        let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
        let generator = CodeGenerator::new(env.clone(), Arc::new(NullRandom::seeded(9)));
        let (p, s) = generator.generate_pair().unwrap();

        let approvals: Vec<_> = keys[1..]
            .iter()
            .map(|k| ValidatorApproval::sign(&p, &s, k))
            .collect();
        service(env, set.clone())
            .register(p.as_str(), s.as_str(), &approvals)
            .unwrap();
        (p, s)
    };

    let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
    assert_eq!(env.product_for_strip(&strip_code).unwrap(), Some(product_id.clone()));
    let history = env.product_history(&product_id).unwrap();
    assert_eq!(history.len(), 1);
    let AuditEvent::Registration(record) = &history[0].event else {
        panic!("expected a registration entry");
    };
    assert_eq!(record.timestamp.as_secs(), 500);

    // The binding is fixed: the strip cannot be reused under a new id.
    let approvals: Vec<_> = keys
        .iter()
        .map(|k| {
            let other = authentimed_types::ProductId::parse("ZZZZ99999Z", CodeFormat::Pan).unwrap();
            ValidatorApproval::sign(&other, &strip_code, k)
        })
        .collect();
    let err = service(env, set)
        .register("ZZZZ99999Z", strip_code.as_str(), &approvals)
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateStripCode(_)));
}

#[test]
fn pan_format_rejects_short_codes() {
    let dir = tempfile::tempdir().unwrap();
    let (_, set) = validators();
    let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
    let err = service(env, set).register("Q1", "S1", &[]).unwrap_err();
    assert!(matches!(err, RegistrationError::MalformedCode { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Quorum is reached exactly when at least a majority of distinct
    /// members signed.
    #[test]
    fn quorum_matches_majority(signers in proptest::collection::vec(0usize..3, 0..6)) {
        let dir = tempfile::tempdir().unwrap();
        let (keys, set) = validators();
        let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
        let service = service(env.clone(), set);

        let p = authentimed_types::ProductId::parse("ABCD12345Z", CodeFormat::Pan).unwrap();
        let s = authentimed_types::StripCode::parse("WXYZ54321A", CodeFormat::Pan).unwrap();
        let approvals: Vec<_> = signers
            .iter()
            .map(|&i| ValidatorApproval::sign(&p, &s, &keys[i]))
            .collect();

        let mut distinct = signers.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let result = service.register(p.as_str(), s.as_str(), &approvals);
        prop_assert_eq!(result.is_ok(), distinct.len() >= 2);
        prop_assert_eq!(env.product_count().unwrap(), u64::from(distinct.len() >= 2));
    }
}
