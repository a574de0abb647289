//! LMDB implementation of AuditStore.
//!
//! Entries live in `audit` under big-endian sequence keys, so LMDB key order
//! is commit order. The `product_audit` index uses composite keys
//! `product_id ++ 0x00 ++ seq_be`; listing a product's history is a prefix
//! scan. The 0x00 separator keeps `Q1` from matching `Q10`.

use authentimed_store::{AuditEntry, AuditEvent, AuditStore, StoreError};
use authentimed_types::ProductId;

use crate::environment::LmdbEnvironment;
use crate::error::decode;
use crate::write_batch::AUDIT_NEXT_SEQ_KEY;
use crate::LmdbError;

pub(crate) fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

pub(crate) fn product_audit_prefix(product_id: &ProductId) -> Vec<u8> {
    let id = product_id.as_bytes();
    let mut key = Vec::with_capacity(id.len() + 1 + 8);
    key.extend_from_slice(id);
    key.push(0);
    key
}

pub(crate) fn product_audit_key(product_id: &ProductId, seq: u64) -> Vec<u8> {
    let mut key = product_audit_prefix(product_id);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn seq_from_index_key(key: &[u8]) -> Result<u64, LmdbError> {
    let tail = key
        .len()
        .checked_sub(8)
        .map(|at| &key[at..])
        .ok_or_else(|| LmdbError::Corruption("product_audit key too short".into()))?;
    let arr: [u8; 8] = tail
        .try_into()
        .map_err(|_| LmdbError::Corruption("product_audit key too short".into()))?;
    Ok(u64::from_be_bytes(arr))
}

impl LmdbEnvironment {
    fn read_entry(&self, rtxn: &heed::RoTxn<'_>, seq: u64) -> Result<Option<AuditEntry>, LmdbError> {
        match self.audit_db.get(rtxn, &seq_key(seq))? {
            Some(bytes) => {
                let event: AuditEvent = decode("audit entry", bytes)?;
                Ok(Some(AuditEntry { seq, event }))
            }
            None => Ok(None),
        }
    }
}

impl AuditStore for LmdbEnvironment {
    fn audit_len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let raw = self
            .meta_db
            .get(&rtxn, AUDIT_NEXT_SEQ_KEY)
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

    fn audit_entry(&self, seq: u64) -> Result<Option<AuditEntry>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.read_entry(&rtxn, seq)?)
    }

    fn audit_range(&self, from_seq: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let lower = seq_key(from_seq);
        let range = (
            std::ops::Bound::Included(&lower[..]),
            std::ops::Bound::Unbounded,
        );
        let mut out = Vec::new();
        for item in self.audit_db.range(&rtxn, &range).map_err(LmdbError::from)? {
            if out.len() >= limit {
                break;
            }
            let (key, bytes) = item.map_err(LmdbError::from)?;
            let arr: [u8; 8] = key
                .try_into()
                .map_err(|_| LmdbError::Corruption("audit key has unexpected length".into()))?;
            let event: AuditEvent = decode("audit entry", bytes)?;
            out.push(AuditEntry {
                seq: u64::from_be_bytes(arr),
                event,
            });
        }
        Ok(out)
    }

    fn product_history(&self, product_id: &ProductId) -> Result<Vec<AuditEntry>, StoreError> {
        let rtxn = self.env().read_txn().map_err(LmdbError::from)?;
        let prefix = product_audit_prefix(product_id);
        let mut seqs = Vec::new();
        for item in self
            .product_audit_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (key, _) = item.map_err(LmdbError::from)?;
            seqs.push(seq_from_index_key(key)?);
        }

        let mut out = Vec::with_capacity(seqs.len());
        for seq in seqs {
            let entry = self.read_entry(&rtxn, seq)?.ok_or_else(|| {
                LmdbError::Corruption(format!("product_audit points at missing entry {seq}"))
            })?;
            out.push(entry);
        }
        Ok(out)
    }
}
