//! Write batching: groups product writes, strip bindings and audit appends
//! into a single LMDB write transaction.
//!
//! # Usage
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! batch.put_product(&product)?;
//! batch.bind_strip(&product.strip_code, &product.product_id)?;
//! let at = batch.commit_timestamp(clock_reading)?;
//! let seq = batch.append_audit(&event)?;
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use authentimed_store::{commit_timestamp, AuditEvent, Product, StoreError};
use authentimed_types::{ProductId, StripCode, Timestamp};

use crate::audit::{product_audit_key, seq_key};
use crate::environment::LmdbEnvironment;
use crate::error::decode;
use crate::LmdbError;

/// Meta key holding the next audit sequence number (big-endian u64).
pub(crate) const AUDIT_NEXT_SEQ_KEY: &[u8] = b"audit_next_seq";

/// Meta key holding the timestamp of the last audit entry (big-endian u64).
pub(crate) const AUDIT_LAST_TS_KEY: &[u8] = b"audit_last_ts";

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, StoreError> {
        let txn = env.env().write_txn().map_err(LmdbError::from)?;
        Ok(Self { txn, env })
    }

    // ── Reads inside the transaction ────────────────────────────────────

    /// Read a product as seen by this transaction.
    pub fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        let raw = self
            .env
            .products_db
            .get(&self.txn, product_id.as_bytes())
            .map_err(LmdbError::from)?;
        match raw {
            Some(bytes) => Ok(Some(decode("product", bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a strip code is already bound, as seen by this transaction.
    pub fn strip_is_bound(&self, strip: &StripCode) -> Result<bool, StoreError> {
        Ok(self
            .env
            .strip_index_db
            .get(&self.txn, strip.as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    // ── Product operations ──────────────────────────────────────────────

    pub fn put_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let bytes = bincode::serialize(product).map_err(LmdbError::from)?;
        self.env
            .products_db
            .put(&mut self.txn, product.product_id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    pub fn bind_strip(&mut self, strip: &StripCode, product_id: &ProductId) -> Result<(), StoreError> {
        self.env
            .strip_index_db
            .put(&mut self.txn, strip.as_bytes(), product_id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(())
    }

    // ── Audit operations ────────────────────────────────────────────────

    /// The time the next entry must be recorded under, given a clock
    /// reading taken before this transaction began.
    pub fn commit_timestamp(&self, proposed: Timestamp) -> Result<Timestamp, StoreError> {
        Ok(commit_timestamp(proposed, self.last_audit_timestamp()?))
    }

    /// Append an event to the audit log and index it under its product.
    /// Returns the assigned sequence number. The event must carry a time
    /// from [`WriteBatch::commit_timestamp`].
    pub fn append_audit(&mut self, event: &AuditEvent) -> Result<u64, StoreError> {
        let seq = self.next_audit_seq()?;
        let at = event.timestamp();
        if let Some(last) = self.last_audit_timestamp()? {
            if at < last {
                return Err(StoreError::InvalidTransition {
                    product_id: event
                        .product_id()
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    reason: format!("audit time {at} precedes last entry at {last}"),
                });
            }
        }
        let bytes = bincode::serialize(event).map_err(LmdbError::from)?;
        self.env
            .audit_db
            .put(&mut self.txn, &seq_key(seq), &bytes)
            .map_err(LmdbError::from)?;

        if let Some(product_id) = event.product_id() {
            self.env
                .product_audit_db
                .put(&mut self.txn, &product_audit_key(product_id, seq), &[])
                .map_err(LmdbError::from)?;
        }

        let next = seq
            .checked_add(1)
            .ok_or_else(|| StoreError::Corruption("audit sequence overflow".into()))?;
        self.env
            .meta_db
            .put(&mut self.txn, AUDIT_NEXT_SEQ_KEY, &next.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.env
            .meta_db
            .put(&mut self.txn, AUDIT_LAST_TS_KEY, &at.as_secs().to_be_bytes())
            .map_err(LmdbError::from)?;
        Ok(seq)
    }

    /// Time of the newest audit entry. Ledgers written before the key
    /// existed fall back to reading that entry.
    fn last_audit_timestamp(&self) -> Result<Option<Timestamp>, StoreError> {
        let raw = self
            .env
            .meta_db
            .get(&self.txn, AUDIT_LAST_TS_KEY)
            .map_err(LmdbError::from)?;
        if let Some(bytes) = raw {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                StoreError::Corruption("audit_last_ts has unexpected byte length".into())
            })?;
            return Ok(Some(Timestamp::new(u64::from_be_bytes(arr))));
        }

        let Some(last_seq) = self.next_audit_seq()?.checked_sub(1) else {
            return Ok(None);
        };
        let bytes = self
            .env
            .audit_db
            .get(&self.txn, &seq_key(last_seq))
            .map_err(LmdbError::from)?
            .ok_or_else(|| StoreError::Corruption(format!("audit entry {last_seq} is missing")))?;
        let event: AuditEvent = decode("audit entry", bytes)?;
        Ok(Some(event.timestamp()))
    }

    fn next_audit_seq(&self) -> Result<u64, StoreError> {
        let raw = self
            .env
            .meta_db
            .get(&self.txn, AUDIT_NEXT_SEQ_KEY)
            .map_err(LmdbError::from)?;
        match raw {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    StoreError::Corruption("audit_next_seq has unexpected byte length".into())
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    // ── Meta operations ─────────────────────────────────────────────────

    pub fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.env
            .meta_db
            .put(&mut self.txn, key.as_bytes(), value)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    // ── Commit ──────────────────────────────────────────────────────────

    /// Commit every operation in the batch as one durable unit.
    pub fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
