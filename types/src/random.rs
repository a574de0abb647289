//! Randomness abstraction for code generation.

/// Source of random bytes for minting product codes.
///
/// Production uses the operating system's generator; tests use
/// `authentimed_nullables::NullRandom` for reproducible codes.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}
