//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node starts
//! accepting registrations or scans.

use std::path::Path;

use authentimed_store::AuditStore;
use heed::types::Bytes;

use crate::environment::{LmdbEnvironment, ALL_DATABASES};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check every named database and the cross-database invariants:
/// each product has exactly one strip binding, and the audit log has no
/// holes below its next sequence number.
pub fn check_integrity(environment: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let env = environment.env();
    let rtxn = env.read_txn()?;

    for &db_name in ALL_DATABASES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{db_name}': {e}")),
                }
            }
            Ok(None) => report.errors.push(format!("database '{db_name}' is missing")),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{db_name}': {e}")),
        }
    }

    let products = environment.products_db.len(&rtxn)?;
    let strips = environment.strip_index_db.len(&rtxn)?;
    if products != strips {
        report.errors.push(format!(
            "{products} products but {strips} strip bindings"
        ));
    }

    let audit_entries = environment.audit_db.len(&rtxn)?;
    drop(rtxn);
    match environment.audit_len() {
        Ok(next_seq) if next_seq != audit_entries => report.errors.push(format!(
            "audit log holds {audit_entries} entries but next sequence is {next_seq}"
        )),
        Ok(_) => {}
        Err(e) => report.errors.push(format!("failed to read audit sequence: {e}")),
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// A missing directory is a fresh start. A directory without `data.mdb`
/// suggests corruption or a misconfigured path.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
