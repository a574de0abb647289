//! The deployment record: the validator set pinned on first open.
//!
//! The set is fixed for the life of a ledger. The first open of a data
//! directory stores it in the meta database; every later open must present
//! the same members and threshold, or may omit the set and inherit it.

use serde::{Deserialize, Serialize};

use authentimed_registry::ValidatorSet;
use authentimed_store::MetaStore;
use authentimed_types::{Timestamp, ValidatorAddress};

use crate::NodeError;

const DEPLOYMENT_KEY: &str = "deployment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Sorted member addresses.
    pub validators: Vec<ValidatorAddress>,
    pub quorum: usize,
    pub deployed_at: Timestamp,
}

impl DeploymentRecord {
    pub fn from_set(set: &ValidatorSet, deployed_at: Timestamp) -> Self {
        Self {
            validators: set.addresses().cloned().collect(),
            quorum: set.quorum(),
            deployed_at,
        }
    }

    pub fn load(store: &impl MetaStore) -> Result<Option<Self>, NodeError> {
        match store.get_meta(DEPLOYMENT_KEY)? {
            Some(bytes) => {
                let record = bincode::deserialize(&bytes).map_err(|e| {
                    NodeError::Integrity(vec![format!("deployment record: {e}")])
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn store(&self, store: &impl MetaStore) -> Result<(), NodeError> {
        let bytes = bincode::serialize(self)
            .map_err(|e| NodeError::Integrity(vec![format!("deployment record: {e}")]))?;
        store.put_meta(DEPLOYMENT_KEY, &bytes)?;
        Ok(())
    }

    /// Rebuild the validator set this record pinned.
    pub fn validator_set(&self) -> Result<ValidatorSet, NodeError> {
        Ok(ValidatorSet::with_quorum(
            self.validators.iter().cloned(),
            self.quorum,
        )?)
    }

    fn matches(&self, set: &ValidatorSet) -> bool {
        self.quorum == set.quorum() && self.validators.iter().eq(set.addresses())
    }
}

/// Settle which validator set governs this ledger.
///
/// - No record and a configured set: the set is recorded (genesis).
/// - A record and no configured set: the recorded set is used.
/// - Both: they must match exactly.
pub fn establish(
    store: &impl MetaStore,
    configured: Option<ValidatorSet>,
    now: Timestamp,
) -> Result<(ValidatorSet, DeploymentRecord), NodeError> {
    match (DeploymentRecord::load(store)?, configured) {
        (None, None) => Err(NodeError::Config(
            "no validators configured and the ledger has no deployment record".into(),
        )),
        (None, Some(set)) => {
            let record = DeploymentRecord::from_set(&set, now);
            record.store(store)?;
            tracing::info!(
                validators = set.len(),
                quorum = set.quorum(),
                "validator set recorded at deployment"
            );
            Ok((set, record))
        }
        (Some(record), None) => {
            let set = record.validator_set()?;
            Ok((set, record))
        }
        (Some(record), Some(set)) => {
            if !record.matches(&set) {
                return Err(NodeError::ValidatorSetMismatch {
                    deployed_count: record.validators.len(),
                    deployed_quorum: record.quorum,
                    configured_count: set.len(),
                    configured_quorum: set.quorum(),
                });
            }
            Ok((set, record))
        }
    }
}
