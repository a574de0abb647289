use thiserror::Error;

use authentimed_types::ErrorKind;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] authentimed_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] authentimed_store_lmdb::LmdbError),

    #[error("validator set error: {0}")]
    ValidatorSet(#[from] authentimed_registry::ValidatorSetError),

    #[error(
        "validator set does not match the deployment record: \
         deployed {deployed_count} validators with quorum {deployed_quorum}, \
         configured {configured_count} with quorum {configured_quorum}"
    )]
    ValidatorSetMismatch {
        deployed_count: usize,
        deployed_quorum: usize,
        configured_count: usize,
        configured_quorum: usize,
    },

    #[error("registration error: {0}")]
    Registration(#[from] authentimed_registry::RegistrationError),

    #[error("verification error: {0}")]
    Verification(#[from] authentimed_verification::VerificationError),

    #[error("integrity check failed: {}", .0.join("; "))]
    Integrity(Vec<String>),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Registration(e) => e.kind(),
            Self::Verification(e) => e.kind(),
            Self::Config(_) | Self::ValidatorSet(_) | Self::ValidatorSetMismatch { .. } => {
                ErrorKind::ClientInput
            }
            Self::Store(_)
            | Self::Lmdb(_)
            | Self::Integrity(_)
            | Self::Metrics(_)
            | Self::Io(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
