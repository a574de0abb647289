//! Abstract storage traits for the Authentimed product ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The registration and verification services depend only on the
//! traits, never on a concrete backend.

pub mod audit;
pub mod error;
pub mod ledger;
pub mod meta;
pub mod product;

pub use audit::{AuditEntry, AuditEvent, AuditStore, RegistrationRecord, ScanRecord, ScanSubject};
pub use error::StoreError;
pub use ledger::{commit_timestamp, stamp_scan, Committed, LedgerStore};
pub use meta::MetaStore;
pub use product::{check_successor, Product, ProductStore};
