//! Errors raised while parsing identifiers handed over by the image decoder.

use thiserror::Error;

/// Why a decoded code string was rejected before reaching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeFormatError {
    #[error("code is empty")]
    Empty,

    #[error("code is {len} characters, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("code contains an undecoded character marker '?'")]
    Undecoded,

    #[error("code contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("code {0:?} does not match the 4 letters + 5 digits + 1 letter layout")]
    Layout(String),

    #[error("decoder flagged the read as invalid")]
    DecodeRejected,
}

/// Coarse classification shared by every service error, so callers can
/// decide between reporting, re-collecting approvals, retrying or halting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input from the caller. Never mutates the ledger, never retried.
    ClientInput,
    /// Registration was refused by the validator rules or uniqueness checks.
    Consensus,
    /// Contention or timeout. Nothing was committed; safe to retry.
    Transient,
    /// The ledger is corrupted or unreachable.
    Fatal,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientInput => "client_input",
            Self::Consensus => "consensus",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
