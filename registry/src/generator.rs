//! Minting fresh, unused product codes.

use std::sync::Arc;

use authentimed_store::ProductStore;
use authentimed_types::{CodeFormat, ProductId, RandomSource, StripCode};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::RegistrationError;

/// Draws before giving up on finding an unused code.
pub const MAX_GENERATION_ATTEMPTS: u32 = 100;

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8; 10] = b"0123456789";

/// Operating-system randomness.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Generates codes in the 4 letters + 5 digits + 1 letter layout that are
/// not yet used as either a product id or a strip code.
///
/// Generation only reads the store. Two generators racing can hand out the
/// same code; registration's uniqueness check settles that.
pub struct CodeGenerator<S: ProductStore> {
    store: Arc<S>,
    rng: Arc<dyn RandomSource>,
    max_attempts: u32,
}

impl<S: ProductStore> CodeGenerator<S> {
    pub fn new(store: Arc<S>, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            store,
            rng,
            max_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// A fresh `(product_id, strip_code)` pair, distinct from each other and
    /// from every code already in the ledger.
    pub fn generate_pair(&self) -> Result<(ProductId, StripCode), RegistrationError> {
        let product = self.generate_unused(None)?;
        let strip = self.generate_unused(Some(&product))?;
        let product_id = ProductId::parse(&product, CodeFormat::Pan).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "product_id",
                source,
            }
        })?;
        let strip_code = StripCode::parse(&strip, CodeFormat::Pan).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "strip_code",
                source,
            }
        })?;
        tracing::debug!(product_id = %product_id, strip_code = %strip_code, "generated code pair");
        Ok((product_id, strip_code))
    }

    fn generate_unused(&self, exclude: Option<&str>) -> Result<String, RegistrationError> {
        for _ in 0..self.max_attempts {
            let code = self.draw();
            if exclude == Some(code.as_str()) || self.is_taken(&code)? {
                continue;
            }
            return Ok(code);
        }
        tracing::warn!(attempts = self.max_attempts, "code generation exhausted");
        Err(RegistrationError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }

    fn is_taken(&self, code: &str) -> Result<bool, RegistrationError> {
        let as_product = ProductId::parse(code, CodeFormat::Pan).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "product_id",
                source,
            }
        })?;
        let as_strip = StripCode::parse(code, CodeFormat::Pan).map_err(|source| {
            RegistrationError::MalformedCode {
                field: "strip_code",
                source,
            }
        })?;
        Ok(self.store.contains_product(&as_product)? || self.store.contains_strip(&as_strip)?)
    }

    fn draw(&self) -> String {
        let mut bytes = [0u8; 10];
        self.rng.fill_bytes(&mut bytes);
        bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                if (4..9).contains(&i) {
                    DIGITS[b as usize % DIGITS.len()] as char
                } else {
                    LETTERS[b as usize % LETTERS.len()] as char
                }
            })
            .collect()
    }
}
