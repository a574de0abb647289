//! Nullable store: thread-safe in-memory ledger for testing.
//!
//! Holds every table behind one mutex, so each commit is as atomic as an
//! LMDB write transaction. Commits can be told to fail to exercise the
//! storage-failure paths of the services above.

use authentimed_store::{
    check_successor, commit_timestamp, stamp_scan, AuditEntry, AuditEvent, AuditStore, Committed,
    LedgerStore, MetaStore, Product, ProductStore, RegistrationRecord, ScanRecord, StoreError,
};
use authentimed_types::{ProductId, StripCode, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    strip_index: HashMap<StripCode, ProductId>,
    audit: Vec<AuditEvent>,
    product_audit: HashMap<ProductId, Vec<u64>>,
    meta: HashMap<String, Vec<u8>>,
}

impl Tables {
    fn commit_time(&self, proposed: Timestamp) -> Timestamp {
        commit_timestamp(proposed, self.audit.last().map(AuditEvent::timestamp))
    }

    fn append(&mut self, event: AuditEvent) -> Committed {
        let seq = self.audit.len() as u64;
        let timestamp = event.timestamp();
        if let Some(id) = event.product_id() {
            self.product_audit.entry(id.clone()).or_default().push(seq);
        }
        self.audit.push(event);
        Committed { seq, timestamp }
    }
}

/// An in-memory [`LedgerStore`].
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with a backend error until reset.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        Ok(())
    }
}

impl ProductStore for NullStore {
    fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().unwrap().products.get(product_id).cloned())
    }

    fn product_for_strip(&self, strip: &StripCode) -> Result<Option<ProductId>, StoreError> {
        Ok(self.tables.lock().unwrap().strip_index.get(strip).cloned())
    }

    fn product_count(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().products.len() as u64)
    }
}

impl AuditStore for NullStore {
    fn audit_len(&self) -> Result<u64, StoreError> {
        Ok(self.tables.lock().unwrap().audit.len() as u64)
    }

    fn audit_entry(&self, seq: u64) -> Result<Option<AuditEntry>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .audit
            .get(seq as usize)
            .map(|event| AuditEntry { seq, event: event.clone() }))
    }

    fn audit_range(&self, from_seq: u64, limit: usize) -> Result<Vec<AuditEntry>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .audit
            .iter()
            .enumerate()
            .skip(from_seq as usize)
            .take(limit)
            .map(|(seq, event)| AuditEntry {
                seq: seq as u64,
                event: event.clone(),
            })
            .collect())
    }

    fn product_history(&self, product_id: &ProductId) -> Result<Vec<AuditEntry>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let Some(seqs) = tables.product_audit.get(product_id) else {
            return Ok(Vec::new());
        };
        Ok(seqs
            .iter()
            .map(|&seq| AuditEntry {
                seq,
                event: tables.audit[seq as usize].clone(),
            })
            .collect())
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tables
            .lock()
            .unwrap()
            .meta
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tables.lock().unwrap().meta.get(key).cloned())
    }
}

impl LedgerStore for NullStore {
    fn commit_registration(
        &self,
        product: &Product,
        record: &RegistrationRecord,
    ) -> Result<Committed, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.products.contains_key(&product.product_id) {
            return Err(StoreError::DuplicateProductId(product.product_id.to_string()));
        }
        if tables.strip_index.contains_key(&product.strip_code) {
            return Err(StoreError::DuplicateStripCode(product.strip_code.to_string()));
        }
        let at = tables.commit_time(record.timestamp);
        let product = Product {
            registration_time: at,
            ..product.clone()
        };
        let record = RegistrationRecord {
            timestamp: at,
            ..record.clone()
        };
        tables
            .strip_index
            .insert(product.strip_code.clone(), product.product_id.clone());
        tables.products.insert(product.product_id.clone(), product);
        Ok(tables.append(AuditEvent::Registration(record)))
    }

    fn commit_scan(
        &self,
        update: Option<&Product>,
        record: &ScanRecord,
    ) -> Result<Committed, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        let at = tables.commit_time(record.timestamp);
        let mut record = record.clone();
        record.timestamp = at;
        if let Some(next) = update {
            if record.product_id() != Some(&next.product_id) {
                return Err(StoreError::InvalidTransition {
                    product_id: next.product_id.to_string(),
                    reason: "scan record does not refer to the updated product".into(),
                });
            }
            let prev = tables
                .products
                .get(&next.product_id)
                .ok_or_else(|| StoreError::NotFound(next.product_id.to_string()))?;
            let mut next = next.clone();
            stamp_scan(prev, &mut next, &mut record, at);
            check_successor(prev, &next)?;
            tables.products.insert(next.product_id.clone(), next);
        }
        Ok(tables.append(AuditEvent::Scan(record)))
    }
}
