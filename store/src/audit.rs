//! Audit log entries and the append-only audit store trait.

use crate::StoreError;
use authentimed_types::{
    Factor, ProductId, ScannerRole, StripCode, Timestamp, ValidatorAddress, Verdict,
};
use serde::{Deserialize, Serialize};

/// A product admitted to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub product_id: ProductId,
    pub strip_code: StripCode,
    pub timestamp: Timestamp,
    /// Validators whose approvals counted toward quorum, sorted.
    pub approvers: Vec<ValidatorAddress>,
}

/// What a scan was about. Scans of unknown codes have no product to point at,
/// so they carry the presented code instead and are not indexed per product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanSubject {
    Product(ProductId),
    Unregistered { code: String },
}

/// One verification attempt that reached the state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub subject: ScanSubject,
    pub factor: Factor,
    pub timestamp: Timestamp,
    pub outcome: Verdict,
    pub role: ScannerRole,
    pub ai_match: bool,
    /// Classifier confidence, kept for the record only.
    pub ai_confidence: Option<f32>,
}

impl ScanRecord {
    pub fn product_id(&self) -> Option<&ProductId> {
        match &self.subject {
            ScanSubject::Product(id) => Some(id),
            ScanSubject::Unregistered { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AuditEvent {
    Registration(RegistrationRecord),
    Scan(ScanRecord),
}

impl AuditEvent {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Registration(r) => r.timestamp,
            Self::Scan(s) => s.timestamp,
        }
    }

    /// The product this event is indexed under, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::Registration(r) => Some(&r.product_id),
            Self::Scan(s) => s.product_id(),
        }
    }
}

/// A committed audit log entry. `seq` is assigned by the store at commit time,
/// starting at 0, without gaps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub event: AuditEvent,
}

/// Read access to the audit log. Appends only happen through
/// [`LedgerStore`](crate::LedgerStore) commits.
pub trait AuditStore {
    /// Number of committed entries.
    fn audit_len(&self) -> Result<u64, StoreError>;

    fn audit_entry(&self, seq: u64) -> Result<Option<AuditEntry>, StoreError>;

    /// Up to `limit` entries starting at `from_seq`, in commit order.
    fn audit_range(&self, from_seq: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError>;

    /// Every entry indexed under a product, in commit order.
    fn product_history(&self, product_id: &ProductId) -> Result<Vec<AuditEntry>, StoreError>;
}
