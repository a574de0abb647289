//! Span constructors for node operations, so traces share names and fields.

use tracing::{info_span, Span};

use authentimed_types::Factor;

/// Span covering one registration attempt.
pub fn register_span(product_id: &str) -> Span {
    info_span!("register", product_id = %product_id)
}

/// Span covering the evaluation of one scan.
pub fn scan_span(factor: Factor) -> Span {
    info_span!("scan", factor = %factor)
}
