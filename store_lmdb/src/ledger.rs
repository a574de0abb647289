//! LMDB implementation of LedgerStore. Each commit is one write transaction.

use authentimed_store::{
    check_successor, stamp_scan, AuditEvent, Committed, LedgerStore, Product, RegistrationRecord,
    ScanRecord, StoreError,
};

use crate::environment::LmdbEnvironment;

impl LedgerStore for LmdbEnvironment {
    fn commit_registration(
        &self,
        product: &Product,
        record: &RegistrationRecord,
    ) -> Result<Committed, StoreError> {
        let mut batch = self.write_batch()?;

        // LMDB serialises writers, so these checks and the inserts below
        // see the same snapshot.
        if batch.get_product(&product.product_id)?.is_some() {
            return Err(StoreError::DuplicateProductId(product.product_id.to_string()));
        }
        if batch.strip_is_bound(&product.strip_code)? {
            return Err(StoreError::DuplicateStripCode(product.strip_code.to_string()));
        }

        let at = batch.commit_timestamp(record.timestamp)?;
        let product = Product {
            registration_time: at,
            ..product.clone()
        };
        let record = RegistrationRecord {
            timestamp: at,
            ..record.clone()
        };

        batch.put_product(&product)?;
        batch.bind_strip(&product.strip_code, &product.product_id)?;
        let seq = batch.append_audit(&AuditEvent::Registration(record))?;
        batch.commit()?;

        tracing::debug!(product_id = %product.product_id, seq, at = at.as_secs(), "registration committed");
        Ok(Committed { seq, timestamp: at })
    }

    fn commit_scan(
        &self,
        update: Option<&Product>,
        record: &ScanRecord,
    ) -> Result<Committed, StoreError> {
        let mut batch = self.write_batch()?;
        let at = batch.commit_timestamp(record.timestamp)?;
        let mut record = record.clone();
        record.timestamp = at;

        if let Some(next) = update {
            if record.product_id() != Some(&next.product_id) {
                return Err(StoreError::InvalidTransition {
                    product_id: next.product_id.to_string(),
                    reason: "scan record does not refer to the updated product".into(),
                });
            }
            let prev = batch
                .get_product(&next.product_id)?
                .ok_or_else(|| StoreError::NotFound(next.product_id.to_string()))?;
            let mut next = next.clone();
            stamp_scan(&prev, &mut next, &mut record, at);
            check_successor(&prev, &next)?;
            batch.put_product(&next)?;
        }

        let seq = batch.append_audit(&AuditEvent::Scan(record))?;
        batch.commit()?;
        Ok(Committed { seq, timestamp: at })
    }
}
