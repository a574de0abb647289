//! Property tests for the verification state machine.

use std::sync::Arc;

use authentimed_nullables::{NullClock, NullStore};
use authentimed_store::{LedgerStore, Product, ProductStore, RegistrationRecord};
use authentimed_types::{CodeFormat, Factor, ProductId, StripCode, Timestamp, Verdict};
use authentimed_verification::VerificationEngine;
use proptest::prelude::*;

fn factor() -> impl Strategy<Value = Factor> {
    prop_oneof![Just(Factor::Qr), Just(Factor::Strip)]
}

fn setup() -> (Arc<NullStore>, Arc<NullClock>, VerificationEngine<NullStore>) {
    let store = Arc::new(NullStore::new());
    let id = ProductId::parse("Q1", CodeFormat::Permissive).unwrap();
    let strip = StripCode::parse("S1", CodeFormat::Permissive).unwrap();
    let record = RegistrationRecord {
        product_id: id.clone(),
        strip_code: strip.clone(),
        timestamp: Timestamp::new(0),
        approvers: Vec::new(),
    };
    store
        .commit_registration(&Product::new(id, strip, Timestamp::new(0)), &record)
        .unwrap();
    let clock = Arc::new(NullClock::new(100));
    let engine = VerificationEngine::new(store.clone(), clock.clone(), CodeFormat::Permissive);
    (store, clock, engine)
}

proptest! {
    /// Whatever the scan sequence, the state never moves backwards, at most
    /// one scan is GENUINE, and the first-scan evidence never changes once set.
    #[test]
    fn state_is_monotonic(scans in proptest::collection::vec((factor(), any::<bool>()), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let (store, clock, engine) = setup();
        let id = ProductId::parse("Q1", CodeFormat::Permissive).unwrap();

        let mut previous = store.get_product(&id).unwrap().unwrap();
        let mut genuine = 0;
        for (factor, ai_match) in scans {
            let code = match factor {
                Factor::Qr => "Q1",
                Factor::Strip => "S1",
            };
            let result = runtime.block_on(engine.verify(code, factor, ai_match)).unwrap();
            if result.verdict() == Verdict::Genuine {
                genuine += 1;
            }
            if !ai_match {
                prop_assert_eq!(result.verdict(), Verdict::Counterfeit);
            }

            let current = store.get_product(&id).unwrap().unwrap();
            prop_assert!(previous.verification_state.can_become(current.verification_state));
            if previous.first_scan_factor.is_some() {
                prop_assert_eq!(previous.first_scan_factor, current.first_scan_factor);
                prop_assert_eq!(previous.first_scan_time, current.first_scan_time);
            }
            previous = current;
            clock.advance(1);
        }
        prop_assert!(genuine <= 1);
    }
}
