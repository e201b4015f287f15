//! Random source implementations.

use tokenflight_core::RandomSource;
use tokenflight_core::error::RandomUnavailable;

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), RandomUnavailable> {
        getrandom::fill(dest).map_err(|e| RandomUnavailable::new(e.to_string()))
    }
}

/// Deterministic generator for tests. Not compiled into production builds.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct SeededRandom {
    rng: std::sync::Mutex<rand::rngs::StdRng>,
}

#[cfg(any(test, feature = "test-util"))]
impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;

        Self {
            rng: std::sync::Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl RandomSource for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), RandomUnavailable> {
        use rand::RngCore;

        use crate::sync::MutexExt;

        self.rng.lock_or_recover().fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflight_core::random_hex;

    #[test]
    fn os_random_produces_distinct_values() {
        let a = random_hex(&OsRandom, 32).unwrap();
        let b = random_hex(&OsRandom, 32).unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let a = random_hex(&SeededRandom::new(42), 16).unwrap();
        let b = random_hex(&SeededRandom::new(42), 16).unwrap();
        let c = random_hex(&SeededRandom::new(43), 16).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
