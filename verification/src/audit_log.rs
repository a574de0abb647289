//! Read side of the audit log.

use std::sync::Arc;

use authentimed_store::{AuditEntry, AuditEvent, AuditStore, StoreError};
use authentimed_types::{Factor, ProductId, Timestamp, Verdict};

/// The scan that activated a product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    pub seq: u64,
    pub factor: Factor,
    pub timestamp: Timestamp,
}

/// Query helper over any [`AuditStore`].
pub struct AuditLog<S: AuditStore> {
    store: Arc<S>,
}

impl<S: AuditStore> AuditLog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        self.store.audit_len()
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Registration and scans of one product, in commit order.
    pub fn history(&self, product_id: &ProductId) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.product_history(product_id)
    }

    /// The GENUINE scan of a product, if it has been activated.
    pub fn first_activation(&self, product_id: &ProductId) -> Result<Option<Activation>, StoreError> {
        let activation = self
            .history(product_id)?
            .into_iter()
            .find_map(|entry| match entry.event {
                AuditEvent::Scan(scan) if scan.outcome == Verdict::Genuine => Some(Activation {
                    seq: entry.seq,
                    factor: scan.factor,
                    timestamp: scan.timestamp,
                }),
                _ => None,
            });
        Ok(activation)
    }

    /// Page through the whole log, including scans of unregistered codes.
    pub fn entries(&self, from_seq: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        self.store.audit_range(from_seq, limit)
    }
}
