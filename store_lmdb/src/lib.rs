//! LMDB storage backend for the Authentimed product ledger.
//!
//! Implements the storage traits from `authentimed-store` using the `heed`
//! LMDB bindings. All logical stores share a single environment so that a
//! product write and its audit entry commit in one transaction.

pub mod audit;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod ledger;
pub mod meta;
pub mod migration;
pub mod product;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use migration::CURRENT_SCHEMA_VERSION;
pub use write_batch::WriteBatch;
