//! Nullable random: deterministic bytes for code generation.

use authentimed_types::RandomSource;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;

enum Mode {
    Seeded(StdRng),
    /// Replays the same bytes on every call.
    Constant(Vec<u8>),
}

/// A deterministic random source for testing.
pub struct NullRandom {
    mode: Mutex<Mode>,
}

impl NullRandom {
    /// A reproducible stream derived from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            mode: Mutex::new(Mode::Seeded(StdRng::seed_from_u64(seed))),
        }
    }

    /// Fill every request with `bytes`, repeated as needed. Every generated
    /// code is then identical, which is how tests force collisions.
    pub fn constant(bytes: Vec<u8>) -> Self {
        Self {
            mode: Mutex::new(Mode::Constant(bytes)),
        }
    }
}

impl RandomSource for NullRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        let mut mode = self.mode.lock().unwrap();
        match &mut *mode {
            Mode::Seeded(rng) => rng.fill_bytes(dest),
            Mode::Constant(bytes) if bytes.is_empty() => dest.fill(0),
            Mode::Constant(bytes) => {
                for (i, b) in dest.iter_mut().enumerate() {
                    *b = bytes[i % bytes.len()];
                }
            }
        }
    }
}
