use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("product id {0} is already registered")]
    DuplicateProductId(String),

    #[error("strip code {0} is already bound to a product")]
    DuplicateStripCode(String),

    #[error("rejected product update for {product_id}: {reason}")]
    InvalidTransition { product_id: String, reason: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    /// Whether the ledger itself can no longer be trusted or reached.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Backend(_) | Self::Serialization(_) | Self::Corruption(_)
        )
    }
}
