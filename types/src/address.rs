//! Validator address type with `amed_` prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validator address, always prefixed with `amed_`.
///
/// Derived from the validator's public key via Blake2b checksum + base32
/// encoding (see `authentimed_crypto::derive_address`). Checksum validation
/// lives in the crypto crate; this type only guards the shape.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorAddress(String);

impl ValidatorAddress {
    /// The standard prefix for all validator addresses.
    pub const PREFIX: &'static str = "amed_";

    /// Wrap an already-encoded address string produced by the crypto crate.
    pub fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    /// Accept a raw string if it carries the prefix and a non-empty body.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with(Self::PREFIX) && raw.len() > Self::PREFIX.len() {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_prefix() {
        assert!(ValidatorAddress::parse("amed_abc").is_some());
        assert!(ValidatorAddress::parse("amed_").is_none());
        assert!(ValidatorAddress::parse("brst_abc").is_none());
    }
}
