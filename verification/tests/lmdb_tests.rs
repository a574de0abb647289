//! Verification against the LMDB backend: durability and the first-scan race.

use std::sync::Arc;

use authentimed_nullables::NullClock;
use authentimed_store::{AuditStore, LedgerStore, Product, ProductStore, RegistrationRecord};
use authentimed_store_lmdb::LmdbEnvironment;
use authentimed_types::{
    CodeFormat, Factor, ProductId, StripCode, Timestamp, Verdict, VerificationState,
};
use authentimed_verification::VerificationEngine;

const MAP_SIZE: usize = 10 * 1024 * 1024;

fn register(env: &LmdbEnvironment, id: &str, strip: &str) {
    let product_id = ProductId::parse(id, CodeFormat::Permissive).unwrap();
    let strip_code = StripCode::parse(strip, CodeFormat::Permissive).unwrap();
    let record = RegistrationRecord {
        product_id: product_id.clone(),
        strip_code: strip_code.clone(),
        timestamp: Timestamp::new(1),
        approvers: Vec::new(),
    };
    env.commit_registration(&Product::new(product_id, strip_code, Timestamp::new(1)), &record)
        .unwrap();
}

#[tokio::test]
async fn replay_detection_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
        register(&env, "Q1", "S1");
        let engine = VerificationEngine::new(env, Arc::new(NullClock::new(50)), CodeFormat::Permissive);
        assert_eq!(
            engine.verify("Q1", Factor::Qr, true).await.unwrap().verdict(),
            Verdict::Genuine
        );
    }

    let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
    let engine = VerificationEngine::new(env.clone(), Arc::new(NullClock::new(90)), CodeFormat::Permissive);
    let result = engine.verify("S1", Factor::Strip, true).await.unwrap();
    assert_eq!(result.verdict(), Verdict::Replayed);
    assert_eq!(result.first_scan(), Some((Factor::Qr, Timestamp::new(50))));
    assert_eq!(env.audit_len().unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_products_race_independently() {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap());
    for i in 0..16 {
        register(&env, &format!("Q{i}"), &format!("S{i}"));
    }
    let engine = Arc::new(VerificationEngine::new(
        env.clone(),
        Arc::new(NullClock::new(7)),
        CodeFormat::Permissive,
    ));

    let mut tasks = Vec::new();
    for i in 0..16 {
        for factor in [Factor::Qr, Factor::Strip] {
            let engine = engine.clone();
            let code = match factor {
                Factor::Qr => format!("Q{i}"),
                Factor::Strip => format!("S{i}"),
            };
            tasks.push(tokio::spawn(async move {
                (i, engine.verify(&code, factor, true).await.unwrap().verdict())
            }));
        }
    }

    let mut genuine = [0u32; 16];
    let mut replayed = [0u32; 16];
    for task in tasks {
        let (i, verdict) = task.await.unwrap();
        match verdict {
            Verdict::Genuine => genuine[i] += 1,
            Verdict::Replayed => replayed[i] += 1,
            other => panic!("unexpected verdict {other}"),
        }
    }

    for i in 0..16 {
        assert_eq!((genuine[i], replayed[i]), (1, 1), "product Q{i}");
        let id = ProductId::parse(&format!("Q{i}"), CodeFormat::Permissive).unwrap();
        let product = env.get_product(&id).unwrap().unwrap();
        assert_eq!(product.verification_state, VerificationState::Replayed);
    }
    // 16 registrations plus 32 scans, no gaps.
    assert_eq!(env.audit_len().unwrap(), 48);
}
