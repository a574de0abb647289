//! End-to-end tests for `LedgerNode` over a real LMDB directory.

use std::path::Path;
use std::sync::Arc;

use authentimed_crypto::{derive_address, keypair_from_seed};
use authentimed_node::{LedgerNode, NodeConfig, NodeError};
use authentimed_nullables::{NullClock, NullRandom};
use authentimed_registry::{RegistrationError, ValidatorApproval};
use authentimed_types::{CodeFormat, Factor, KeyPair, ProductId, StripCode, Verdict};
use authentimed_verification::ScanInput;

fn keys() -> Vec<KeyPair> {
    (1..=3).map(|i| keypair_from_seed(&[i; 32])).collect()
}

fn config(dir: &Path, keys: &[KeyPair]) -> NodeConfig {
    NodeConfig {
        data_dir: dir.join("ledger"),
        map_size_mb: 16,
        validators: keys
            .iter()
            .map(|k| derive_address(&k.public).as_str().to_string())
            .collect(),
        enable_metrics: true,
        ..NodeConfig::default()
    }
}

fn open(config: NodeConfig, now: u64) -> Result<LedgerNode, NodeError> {
    LedgerNode::open_with(
        config,
        Arc::new(NullClock::new(now)),
        Arc::new(NullRandom::seeded(42)),
    )
}

fn approve(keys: &[KeyPair], product_id: &str, strip_code: &str) -> Vec<ValidatorApproval> {
    let p = ProductId::parse(product_id, CodeFormat::Permissive).unwrap();
    let s = StripCode::parse(strip_code, CodeFormat::Permissive).unwrap();
    keys.iter().map(|k| ValidatorApproval::sign(&p, &s, k)).collect()
}

#[test]
fn first_open_records_the_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    let node = open(config(dir.path(), &keys), 100).unwrap();

    let deployment = node.deployment();
    assert_eq!(deployment.validators.len(), 3);
    assert_eq!(deployment.quorum, 2);
    assert_eq!(deployment.deployed_at.as_secs(), 100);
    assert_eq!(node.validators().quorum(), 2);
}

#[test]
fn reopen_without_validators_inherits_the_recorded_set() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    drop(open(config(dir.path(), &keys), 100).unwrap());

    let bare = NodeConfig {
        validators: Vec::new(),
        ..config(dir.path(), &keys)
    };
    let node = open(bare, 200).unwrap();
    assert_eq!(node.validators().len(), 3);
    assert_eq!(node.deployment().deployed_at.as_secs(), 100);
    for k in &keys {
        assert!(node.validators().contains(&derive_address(&k.public)));
    }
}

#[test]
fn reopen_with_a_different_set_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    drop(open(config(dir.path(), &keys), 100).unwrap());

    let smaller = config(dir.path(), &keys[..2]);
    assert!(matches!(
        open(smaller, 200),
        Err(NodeError::ValidatorSetMismatch {
            deployed_count: 3,
            configured_count: 2,
            ..
        })
    ));

    let stricter = NodeConfig {
        quorum: Some(3),
        ..config(dir.path(), &keys)
    };
    assert!(matches!(
        open(stricter, 200),
        Err(NodeError::ValidatorSetMismatch {
            deployed_quorum: 2,
            configured_quorum: 3,
            ..
        })
    ));
}

#[test]
fn fresh_ledger_without_validators_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let bare = NodeConfig {
        data_dir: dir.path().join("ledger"),
        map_size_mb: 16,
        ..NodeConfig::default()
    };
    assert!(matches!(open(bare, 1), Err(NodeError::Config(_))));
}

#[test]
fn quorum_below_majority_is_rejected_before_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    let weak = NodeConfig {
        quorum: Some(1),
        ..config(dir.path(), &keys)
    };
    assert!(matches!(open(weak, 1), Err(NodeError::ValidatorSet(_))));
}

#[tokio::test]
async fn register_verify_and_replay_flow() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    let node = open(config(dir.path(), &keys), 1000).unwrap();

    // One approval is not enough.
    let err = node
        .register("P-1", "S-1", &approve(&keys[..1], "P-1", "S-1"))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::QuorumNotMet { have: 1, need: 2 }));

    node.register("P-1", "S-1", &approve(&keys[..2], "P-1", "S-1"))
        .unwrap();

    let genuine = node
        .verify(ScanInput::new("P-1", Factor::Qr, true))
        .await
        .unwrap();
    assert_eq!(genuine.verdict(), Verdict::Genuine);

    let replayed = node
        .verify(ScanInput::new("S-1", Factor::Strip, true))
        .await
        .unwrap();
    assert_eq!(replayed.verdict(), Verdict::Replayed);
    assert_eq!(replayed.first_scan().map(|(f, _)| f), Some(Factor::Qr));

    let status = node.status("P-1", Factor::Qr).unwrap();
    assert_eq!(status.verdict(), Verdict::Replayed);

    let product_id = ProductId::parse("P-1", CodeFormat::Permissive).unwrap();
    let history = node.history(&product_id).unwrap();
    assert_eq!(history.len(), 3);
    let first = node.first_activation(&product_id).unwrap().unwrap();
    assert_eq!(first.factor, Factor::Qr);
    assert_eq!(first.timestamp.as_secs(), 1000);

    let metrics = node.metrics().unwrap();
    assert_eq!(metrics.registrations.get(), 1);
    assert_eq!(
        metrics
            .registrations_rejected
            .with_label_values(&["consensus"])
            .get(),
        1
    );
    assert_eq!(metrics.scans.with_label_values(&["GENUINE"]).get(), 1);
    assert_eq!(metrics.scans.with_label_values(&["REPLAYED"]).get(), 1);
    assert_eq!(metrics.product_count.get(), 1);
}

#[tokio::test]
async fn unregistered_scans_are_counterfeit_and_logged() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    let node = open(config(dir.path(), &keys), 5).unwrap();

    let result = node
        .verify(ScanInput::new("NOPE", Factor::Qr, true))
        .await
        .unwrap();
    assert_eq!(result.verdict(), Verdict::Counterfeit);
    assert_eq!(node.audit_entries(0, 10).unwrap().len(), 1);
}

#[test]
fn generated_pairs_can_be_registered() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    let node = open(config(dir.path(), &keys), 7).unwrap();

    let (product_id, strip_code) = node.generate_pair().unwrap();
    assert_ne!(product_id.as_str(), strip_code.as_str());
    let approvals: Vec<_> = keys
        .iter()
        .map(|k| ValidatorApproval::sign(&product_id, &strip_code, k))
        .collect();
    let product = node
        .register(product_id.as_str(), strip_code.as_str(), &approvals)
        .unwrap();
    assert_eq!(product.product_id, product_id);

    // The next pair avoids everything already registered.
    let (next_id, next_strip) = node.generate_pair().unwrap();
    assert_ne!(next_id, product_id);
    assert_ne!(next_strip, strip_code);
}

#[tokio::test]
async fn state_survives_a_node_restart() {
    let dir = tempfile::tempdir().unwrap();
    let keys = keys();
    {
        let node = open(config(dir.path(), &keys), 10).unwrap();
        node.register("P-9", "S-9", &approve(&keys, "P-9", "S-9"))
            .unwrap();
        node.verify(ScanInput::new("S-9", Factor::Strip, true))
            .await
            .unwrap();
        node.sync().unwrap();
    }

    let node = open(config(dir.path(), &keys), 20).unwrap();
    assert_eq!(node.metrics().unwrap().product_count.get(), 1);
    let status = node.status("S-9", Factor::Strip).unwrap();
    assert_eq!(status.verdict(), Verdict::Verified);
    let replay = node
        .verify(ScanInput::new("P-9", Factor::Qr, true))
        .await
        .unwrap();
    assert_eq!(replay.verdict(), Verdict::Replayed);
}
