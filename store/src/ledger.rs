//! Atomic write operations over the code identity store and audit log.

use authentimed_types::Timestamp;

use crate::{AuditStore, MetaStore, Product, ProductStore, RegistrationRecord, ScanRecord, StoreError};

/// Where a commit landed in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Committed {
    pub seq: u64,
    /// The time the entry was recorded under. Never earlier than any entry
    /// committed before it.
    pub timestamp: Timestamp,
}

/// The time a new entry is recorded under: the caller's clock reading,
/// raised to the last committed timestamp if the clock is behind it.
pub fn commit_timestamp(proposed: Timestamp, last: Option<Timestamp>) -> Timestamp {
    match last {
        Some(last) if last > proposed => last,
        _ => proposed,
    }
}

/// Apply the commit time to everything a scan commit writes. A product
/// update that activates the product gets it as its first scan time.
pub fn stamp_scan(
    prev: &Product,
    next: &mut Product,
    record: &mut ScanRecord,
    at: Timestamp,
) {
    record.timestamp = at;
    if prev.first_scan_time.is_none() && next.first_scan_time.is_some() {
        next.first_scan_time = Some(at);
    }
}

/// A full ledger backend.
///
/// Both commit methods are all-or-nothing: either the product write and the
/// audit append are durable together, or neither is visible.
///
/// The timestamps on the records passed in are clock readings taken before
/// the commit. The store records each entry under [`commit_timestamp`] of
/// that reading, inside the write, so the audit log is ordered by time as
/// well as by sequence.
pub trait LedgerStore: ProductStore + AuditStore + MetaStore + Send + Sync {
    /// Insert a new product, bind its strip code and append its registration
    /// entry. Fails with [`StoreError::DuplicateProductId`] or
    /// [`StoreError::DuplicateStripCode`] without writing anything if either
    /// key is taken. The product's registration time is the commit time.
    fn commit_registration(
        &self,
        product: &Product,
        record: &RegistrationRecord,
    ) -> Result<Committed, StoreError>;

    /// Append a scan entry, optionally together with a product update. The
    /// update must pass [`check_successor`](crate::check_successor) against
    /// the stored record. An activating update's first scan time is the
    /// commit time.
    fn commit_scan(
        &self,
        update: Option<&Product>,
        record: &ScanRecord,
    ) -> Result<Committed, StoreError>;
}
