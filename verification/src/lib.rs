//! One-time verification of registered products.
//!
//! Every package carries two codes bound at registration: the product id in
//! the outer QR code and a strip code hidden inside. Whichever is scanned
//! first activates the product. A later scan of the *other* code means the
//! package was copied or reused, and the product is flagged as replayed for
//! good.
//!
//! Scans of one product are serialised by a per-product lock; the state
//! change and its audit entry commit as one storage transaction.

pub mod audit_log;
pub mod engine;
pub mod error;
pub mod input;
pub mod lock_table;
pub mod result;

pub use audit_log::{Activation, AuditLog};
pub use engine::{VerificationEngine, DEFAULT_LOCK_TIMEOUT};
pub use error::VerificationError;
pub use input::ScanInput;
pub use lock_table::{LockTable, ProductGuard};
pub use result::{CounterfeitReason, VerificationReport, VerificationResult};
