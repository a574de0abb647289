//! Fundamental types for the Authentimed product ledger.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! product identifiers, authentication factors, verification states and verdicts,
//! validator identities, key material, and timestamps.

pub mod address;
pub mod code;
pub mod error;
pub mod keys;
pub mod random;
pub mod state;
pub mod time;

pub use address::ValidatorAddress;
pub use code::{CodeFormat, ProductId, StripCode};
pub use error::{CodeFormatError, ErrorKind};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use random::RandomSource;
pub use state::{Factor, ScannerRole, Verdict, VerificationState};
pub use time::{Clock, SystemClock, Timestamp};
