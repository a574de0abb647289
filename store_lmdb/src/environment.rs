//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use authentimed_store::StoreError;

use crate::migration::Migrator;
use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Named databases inside the environment.
pub(crate) const PRODUCTS_DB: &str = "products";
pub(crate) const STRIP_INDEX_DB: &str = "strip_index";
pub(crate) const AUDIT_DB: &str = "audit";
pub(crate) const PRODUCT_AUDIT_DB: &str = "product_audit";
pub(crate) const META_DB: &str = "meta";

pub(crate) const ALL_DATABASES: &[&str] = &[
    PRODUCTS_DB,
    STRIP_INDEX_DB,
    AUDIT_DB,
    PRODUCT_AUDIT_DB,
    META_DB,
];

/// Wraps the LMDB environment and all database handles.
///
/// Layout:
/// - `products`: product_id -> bincode [`Product`](authentimed_store::Product)
/// - `strip_index`: strip_code -> product_id
/// - `audit`: big-endian u64 sequence -> bincode [`AuditEvent`](authentimed_store::AuditEvent)
/// - `product_audit`: product_id ++ 0x00 ++ big-endian sequence -> empty
/// - `meta`: bookkeeping (schema version, next audit sequence, deployment)
pub struct LmdbEnvironment {
    env: Env,
    pub(crate) products_db: Database<Bytes, Bytes>,
    pub(crate) strip_index_db: Database<Bytes, Bytes>,
    pub(crate) audit_db: Database<Bytes, Bytes>,
    pub(crate) product_audit_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, creating the
    /// directory if needed and bringing the schema up to date.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path and
        // the memory map is never modified outside of heed transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(ALL_DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let products_db = env.create_database(&mut wtxn, Some(PRODUCTS_DB))?;
        let strip_index_db = env.create_database(&mut wtxn, Some(STRIP_INDEX_DB))?;
        let audit_db = env.create_database(&mut wtxn, Some(AUDIT_DB))?;
        let product_audit_db = env.create_database(&mut wtxn, Some(PRODUCT_AUDIT_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        let environment = Self {
            env,
            products_db,
            strip_index_db,
            audit_db,
            product_audit_db,
            meta_db,
        };
        Migrator::run(&environment)?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(environment)
    }

    pub(crate) fn env(&self) -> &Env {
        &self.env
    }

    /// Begin a write batch. Dropping it without [`WriteBatch::commit`] aborts.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, StoreError> {
        WriteBatch::new(self)
    }

    /// Flush the memory map to disk.
    pub fn force_sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
