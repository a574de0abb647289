use authentimed_store::StoreError;
use authentimed_types::{CodeFormatError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("product id {0} is already registered")]
    DuplicateProductId(String),

    #[error("strip code {0} is already bound to a product")]
    DuplicateStripCode(String),

    #[error("quorum not met: have {have} valid approvals, need {need}")]
    QuorumNotMet { have: usize, need: usize },

    #[error("approval signed by {0}, which is not in the validator set")]
    UnknownValidator(String),

    #[error("malformed {field}: {source}")]
    MalformedCode {
        field: &'static str,
        #[source]
        source: CodeFormatError,
    },

    #[error("malformed approval token: {0}")]
    MalformedApproval(String),

    #[error("no unused code found after {attempts} attempts")]
    CodeSpaceExhausted { attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCode { .. } | Self::MalformedApproval(_) => ErrorKind::ClientInput,
            Self::DuplicateProductId(_)
            | Self::DuplicateStripCode(_)
            | Self::QuorumNotMet { .. }
            | Self::UnknownValidator(_) => ErrorKind::Consensus,
            // A fresh draw may well land on free codes.
            Self::CodeSpaceExhausted { .. } => ErrorKind::Transient,
            Self::Storage(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Why a validator set could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorSetError {
    #[error("validator set is empty")]
    Empty,

    #[error("invalid validator address: {0}")]
    InvalidAddress(String),

    #[error("validator {0} is listed twice")]
    DuplicateValidator(String),

    #[error("quorum {quorum} is invalid for {size} validators (must be between {min} and {size})")]
    InvalidQuorum { quorum: usize, size: usize, min: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            RegistrationError::QuorumNotMet { have: 1, need: 2 }.kind(),
            ErrorKind::Consensus
        );
        assert_eq!(
            RegistrationError::MalformedCode {
                field: "product_id",
                source: CodeFormatError::Empty
            }
            .kind(),
            ErrorKind::ClientInput
        );
        let storage = RegistrationError::from(StoreError::Backend("disk".into()));
        assert_eq!(storage.kind(), ErrorKind::Fatal);
        assert!(!storage.is_retryable());
        assert!(RegistrationError::CodeSpaceExhausted { attempts: 100 }.is_retryable());
    }

    #[test]
    fn messages_carry_reason() {
        let e = RegistrationError::QuorumNotMet { have: 1, need: 2 };
        assert_eq!(e.to_string(), "quorum not met: have 1 valid approvals, need 2");
    }
}
