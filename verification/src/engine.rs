//! The verification state machine.
//!
//! ```text
//!   UNVERIFIED --scan(f)--> VERIFIED(first = f)
//!   VERIFIED   --scan(f)--> VERIFIED            (same factor, no change)
//!   VERIFIED   --scan(g)--> REPLAYED            (g != f)
//!   REPLAYED   --scan(*)--> REPLAYED            (terminal)
//! ```
//!
//! A failed visual check or an unknown code is COUNTERFEIT and never moves
//! the state. Every evaluated scan is appended to the audit log in the same
//! transaction as any state change.

use std::sync::Arc;
use std::time::Duration;

use authentimed_store::{Committed, LedgerStore, Product, ScanRecord, ScanSubject};
use authentimed_types::{
    Clock, CodeFormat, CodeFormatError, Factor, ProductId, StripCode, Timestamp, Verdict,
    VerificationState,
};

use crate::error::VerificationError;
use crate::input::ScanInput;
use crate::lock_table::LockTable;
use crate::result::{CounterfeitReason, VerificationResult};

/// How long a scan waits for another scan of the same product.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// A presented code after parsing, with the product it resolved to.
struct Resolved {
    code: String,
    product_id: Option<ProductId>,
}

pub struct VerificationEngine<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: LockTable,
    format: CodeFormat,
    lock_timeout: Duration,
}

impl<S: LedgerStore> VerificationEngine<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, format: CodeFormat) -> Self {
        Self {
            store,
            clock,
            locks: LockTable::new(),
            format,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Evaluate a scan with a valid decode and no further context.
    pub async fn verify(
        &self,
        code: &str,
        factor: Factor,
        ai_match: bool,
    ) -> Result<VerificationResult, VerificationError> {
        self.verify_scan(ScanInput::new(code, factor, ai_match)).await
    }

    /// Evaluate a scan, apply the state transition and record it.
    pub async fn verify_scan(&self, input: ScanInput) -> Result<VerificationResult, VerificationError> {
        let resolved = self.resolve(&input)?;

        let Some(product_id) = resolved.product_id else {
            let now = self.clock.now();
            self.record(
                None,
                ScanSubject::Unregistered {
                    code: resolved.code.clone(),
                },
                &input,
                Verdict::Counterfeit,
                now,
            )?;
            tracing::warn!(code = %resolved.code, factor = %input.factor, "scan of unregistered code");
            return Ok(VerificationResult::Counterfeit {
                code: resolved.code,
                factor: input.factor,
                reason: CounterfeitReason::NotRegistered,
                product_id: None,
            });
        };

        let _guard = self
            .locks
            .acquire(&product_id, self.lock_timeout)
            .await
            .ok_or_else(|| {
                tracing::warn!(product_id = %product_id, "timed out waiting for product lock");
                VerificationError::LedgerBusy {
                    product_id: product_id.clone(),
                }
            })?;

        // Nothing below awaits, so a cancelled caller either never got here
        // or sees the whole commit through.
        let product = self.store.get_product(&product_id)?.ok_or_else(|| {
            VerificationError::Inconsistent(format!("{product_id} resolved but has no record"))
        })?;
        let now = self.clock.now();

        if !input.ai_match {
            self.record(
                None,
                ScanSubject::Product(product_id.clone()),
                &input,
                Verdict::Counterfeit,
                now,
            )?;
            tracing::warn!(product_id = %product_id, factor = %input.factor, "visual mismatch");
            return Ok(VerificationResult::Counterfeit {
                code: resolved.code,
                factor: input.factor,
                reason: CounterfeitReason::VisualMismatch,
                product_id: Some(product_id),
            });
        }

        self.transition(product, &input, now)
    }

    /// Read-only view of the stored state through a presented code. Nothing
    /// is recorded. A never-scanned product reads as UNVERIFIED, and an
    /// activated one reads as VERIFIED through either code until a replay
    /// has actually been committed.
    pub fn status(&self, code: &str, factor: Factor) -> Result<VerificationResult, VerificationError> {
        let resolved = self.resolve(&ScanInput::new(code, factor, true))?;
        let product = match resolved.product_id {
            Some(id) => self.store.get_product(&id)?,
            None => None,
        };
        let Some(product) = product else {
            return Ok(VerificationResult::Counterfeit {
                code: resolved.code,
                factor,
                reason: CounterfeitReason::NotRegistered,
                product_id: None,
            });
        };

        let Product {
            product_id,
            strip_code,
            verification_state,
            first_scan_factor,
            first_scan_time,
            ..
        } = product;
        let result = match (verification_state, first_scan_factor, first_scan_time) {
            (VerificationState::Unverified, _, _) => VerificationResult::Unverified {
                product_id,
                strip_code,
                factor,
            },
            (VerificationState::Verified, Some(first), Some(at)) => VerificationResult::Verified {
                product_id,
                strip_code,
                factor,
                first_scan_factor: first,
                first_scan_time: at,
            },
            (VerificationState::Replayed, Some(first), Some(at)) => VerificationResult::Replayed {
                product_id,
                strip_code,
                factor,
                first_scan_factor: first,
                first_scan_time: at,
            },
            (state, _, _) => {
                return Err(VerificationError::Inconsistent(format!(
                    "{product_id} is {state} without first scan evidence"
                )))
            }
        };
        Ok(result)
    }

    fn resolve(&self, input: &ScanInput) -> Result<Resolved, VerificationError> {
        if !input.decode_valid {
            return Err(CodeFormatError::DecodeRejected.into());
        }
        match input.factor {
            Factor::Qr => {
                let id = ProductId::parse(&input.code, self.format)?;
                let known = self.store.contains_product(&id)?;
                tracing::debug!(product_id = %id, known, "resolved qr code");
                Ok(Resolved {
                    code: id.to_string(),
                    product_id: known.then_some(id),
                })
            }
            Factor::Strip => {
                let strip = StripCode::parse(&input.code, self.format)?;
                let product_id = self.store.product_for_strip(&strip)?;
                tracing::debug!(strip_code = %strip, known = product_id.is_some(), "resolved strip code");
                Ok(Resolved {
                    code: strip.to_string(),
                    product_id,
                })
            }
        }
    }

    /// Apply a matching scan to a product held under its lock.
    fn transition(
        &self,
        mut product: Product,
        input: &ScanInput,
        now: Timestamp,
    ) -> Result<VerificationResult, VerificationError> {
        let factor = input.factor;
        let subject = ScanSubject::Product(product.product_id.clone());

        match (product.verification_state, product.first_scan_factor, product.first_scan_time) {
            (VerificationState::Unverified, _, _) => {
                product.activate(factor, now);
                let committed = self.record(Some(&product), subject, input, Verdict::Genuine, now)?;
                tracing::info!(
                    product_id = %product.product_id,
                    factor = %factor,
                    at = committed.timestamp.as_secs(),
                    "product activated"
                );
                Ok(VerificationResult::Genuine {
                    product_id: product.product_id,
                    strip_code: product.strip_code,
                    factor,
                    first_scan_time: committed.timestamp,
                })
            }
            (VerificationState::Verified, Some(first), Some(at)) if first == factor => {
                self.record(None, subject, input, Verdict::Verified, now)?;
                tracing::debug!(product_id = %product.product_id, factor = %factor, "repeat scan");
                Ok(VerificationResult::Verified {
                    product_id: product.product_id,
                    strip_code: product.strip_code,
                    factor,
                    first_scan_factor: first,
                    first_scan_time: at,
                })
            }
            (state, Some(first), Some(at)) => {
                let update = if state == VerificationState::Verified {
                    product.mark_replayed();
                    Some(&product)
                } else {
                    None
                };
                self.record(update, subject, input, Verdict::Replayed, now)?;
                tracing::warn!(
                    product_id = %product.product_id,
                    factor = %factor,
                    first_scan_factor = %first,
                    first_scan_time = at.as_secs(),
                    "replay detected"
                );
                Ok(VerificationResult::Replayed {
                    product_id: product.product_id,
                    strip_code: product.strip_code,
                    factor,
                    first_scan_factor: first,
                    first_scan_time: at,
                })
            }
            (state, _, _) => Err(VerificationError::Inconsistent(format!(
                "{} is {state} without first scan evidence",
                product.product_id
            ))),
        }
    }

    fn record(
        &self,
        update: Option<&Product>,
        subject: ScanSubject,
        input: &ScanInput,
        outcome: Verdict,
        now: Timestamp,
    ) -> Result<Committed, VerificationError> {
        let record = ScanRecord {
            subject,
            factor: input.factor,
            timestamp: now,
            outcome,
            role: input.role,
            ai_match: input.ai_match,
            ai_confidence: input.ai_confidence,
        };
        self.store.commit_scan(update, &record).map_err(|e| {
            tracing::error!(error = %e, "failed to commit scan");
            VerificationError::from(e)
        })
    }
}
