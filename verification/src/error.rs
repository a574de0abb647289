use authentimed_store::StoreError;
use authentimed_types::{CodeFormatError, ErrorKind, ProductId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("malformed code: {0}")]
    MalformedCode(#[from] CodeFormatError),

    #[error("ledger busy: product {product_id} is locked, retry later")]
    LedgerBusy { product_id: ProductId },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("ledger inconsistency: {0}")]
    Inconsistent(String),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCode(_) => ErrorKind::ClientInput,
            Self::LedgerBusy { .. } => ErrorKind::Transient,
            Self::Storage(_) | Self::Inconsistent(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
