//! Product registration behind a fixed validator set.
//!
//! A product enters the ledger only when a quorum of the validators agreed at
//! deployment have signed its `(product_id, strip_code)` pairing. This is the
//! single point where trust is established; verification later relies on the
//! stored binding without re-checking signatures.

pub mod approval;
pub mod error;
pub mod generator;
pub mod service;
pub mod validator_set;

pub use approval::{registration_payload, ValidatorApproval, REGISTRATION_DOMAIN};
pub use error::{RegistrationError, ValidatorSetError};
pub use generator::{CodeGenerator, OsRandom, MAX_GENERATION_ATTEMPTS};
pub use service::RegistrationService;
pub use validator_set::ValidatorSet;
