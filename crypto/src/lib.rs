//! Cryptographic primitives for the Authentimed ledger.
//!
//! - **Ed25519** for validator approvals of product registrations
//! - **Blake2b** for hashing approval payloads and address checksums
//! - Validator address derivation with `amed_` prefix and base32 encoding

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_address, derive_address, public_key_of, validate_address};
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
