//! Cryptographically secure randomness.
//!
//! The vault draws salts and nonces through the [`RandomSource`] trait so
//! hosts (and tests) can supply their own generator.

use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::errors::{Result, VaultError};

/// A source of cryptographically secure random bytes.
pub trait RandomSource {
    /// Fill `dest` entirely with random bytes.
    fn fill(&mut self, dest: &mut [u8]) -> Result<()>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| VaultError::RandomUnavailable(e.to_string()))
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        (**self).fill(dest)
    }
}

/// Draw a fixed-size array from `rng`.
pub fn random_array<const N: usize>(rng: &mut dyn RandomSource) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    rng.fill(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_random_fills_buffer() {
        let a: [u8; 32] = random_array(&mut OsRandom).unwrap();
        let b: [u8; 32] = random_array(&mut OsRandom).unwrap();
        assert_ne!(a, b);
    }
}
