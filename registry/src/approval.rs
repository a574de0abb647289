//! Validator approvals of a product registration.
//!
//! A validator approves a pairing by signing
//! `Blake2b-256(domain ‖ len ‖ product_id ‖ len ‖ strip_code)` with its
//! Ed25519 key. The lengths are big-endian u32, so no two pairings share a
//! payload.

use authentimed_crypto::{blake2b_256_multi, derive_address, sign_message, verify_signature};
use authentimed_types::{KeyPair, ProductId, PublicKey, Signature, StripCode, ValidatorAddress};
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

pub const REGISTRATION_DOMAIN: &[u8] = b"authentimed/registration/v1";

/// The 32-byte digest validators sign for a pairing.
pub fn registration_payload(product_id: &ProductId, strip_code: &StripCode) -> [u8; 32] {
    let pid = product_id.as_bytes();
    let strip = strip_code.as_bytes();
    let pid_len = (pid.len() as u32).to_be_bytes();
    let strip_len = (strip.len() as u32).to_be_bytes();
    blake2b_256_multi(&[REGISTRATION_DOMAIN, &pid_len, pid, &strip_len, strip])
}

/// One validator's signature over a registration payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorApproval {
    pub validator: ValidatorAddress,
    pub signature: Signature,
}

impl ValidatorApproval {
    /// Sign a pairing with a validator key.
    pub fn sign(product_id: &ProductId, strip_code: &StripCode, keypair: &KeyPair) -> Self {
        let payload = registration_payload(product_id, strip_code);
        Self {
            validator: derive_address(&keypair.public),
            signature: sign_message(&payload, &keypair.private),
        }
    }

    /// Whether the signature is valid for this pairing under `key`.
    pub fn verifies(&self, product_id: &ProductId, strip_code: &StripCode, key: &PublicKey) -> bool {
        let payload = registration_payload(product_id, strip_code);
        verify_signature(&payload, &self.signature, key)
    }

    /// Text form handed between operators: `address:hex(signature)`.
    pub fn to_token(&self) -> String {
        format!("{}:{}", self.validator, hex::encode(self.signature.as_bytes()))
    }

    pub fn from_token(token: &str) -> Result<Self, RegistrationError> {
        let (address, sig_hex) = token
            .trim()
            .split_once(':')
            .ok_or_else(|| RegistrationError::MalformedApproval("missing ':' separator".into()))?;
        let validator = ValidatorAddress::parse(address).ok_or_else(|| {
            RegistrationError::MalformedApproval(format!("bad validator address {address:?}"))
        })?;
        let bytes = hex::decode(sig_hex)
            .map_err(|e| RegistrationError::MalformedApproval(format!("signature: {e}")))?;
        let signature = Signature::from_slice(&bytes).ok_or_else(|| {
            RegistrationError::MalformedApproval(format!(
                "signature is {} bytes, expected 64",
                bytes.len()
            ))
        })?;
        Ok(Self { validator, signature })
    }
}
