//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! One passphrase and one 32-byte salt produce two independent 256-bit
//! keys: the AEAD key is derived with the salt as stored, the HMAC key
//! with the salt byte-reversed.  Every unlock repeats the full derivation;
//! nothing is cached between sessions.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::random::{random_array, RandomSource};
use crate::errors::{Result, VaultError};

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of each derived key in bytes (256 bits, for AES-256 / HMAC-SHA256).
pub const KEY_LEN: usize = 32;

/// Passphrases shorter than this (in characters) are rejected.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// OWASP 2023 recommendation for PBKDF2-SHA256.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Highest iteration count a document may ask for.
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Tunable PBKDF2 parameters.
///
/// The iteration count is stored alongside the salt so a vault keeps
/// opening with the count it was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Reject iteration counts below the hardening floor or above the
    /// ceiling.
    pub fn validate(&self) -> Result<()> {
        if self.iterations < DEFAULT_ITERATIONS {
            return Err(VaultError::KeyDerivationFailed(format!(
                "PBKDF2 iterations must be at least {DEFAULT_ITERATIONS} (got {})",
                self.iterations
            )));
        }
        if self.iterations > MAX_ITERATIONS {
            return Err(VaultError::KeyDerivationFailed(format!(
                "PBKDF2 iterations must be at most {MAX_ITERATIONS} (got {})",
                self.iterations
            )));
        }
        Ok(())
    }
}

/// The key pair held by an unlocked session.  Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    cipher_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl DerivedKeys {
    /// Key for AES-256-GCM.
    pub fn cipher_key(&self) -> &[u8; KEY_LEN] {
        &self.cipher_key
    }

    /// Key for the HMAC-SHA256 integrity tag.
    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }

    #[cfg(test)]
    pub(crate) fn from_raw(cipher_key: [u8; KEY_LEN], mac_key: [u8; KEY_LEN]) -> Self {
        Self {
            cipher_key,
            mac_key,
        }
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeys(<redacted>)")
    }
}

/// Check the minimum-length rule without deriving anything.
pub fn check_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(VaultError::WeakPassphrase {
            min: MIN_PASSPHRASE_LEN,
        });
    }
    Ok(())
}

/// Derive the cipher key and MAC key from `passphrase` and `salt`.
///
/// A wrong passphrase is not detectable here; it only surfaces when the
/// verification record fails to authenticate.
pub fn derive_keys(
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<DerivedKeys> {
    check_passphrase(passphrase)?;
    params.validate()?;

    let mut keys = DerivedKeys {
        cipher_key: [0u8; KEY_LEN],
        mac_key: [0u8; KEY_LEN],
    };

    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt,
        params.iterations,
        &mut keys.cipher_key,
    );

    let mut reversed = *salt;
    reversed.reverse();
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        &reversed,
        params.iterations,
        &mut keys.mac_key,
    );

    Ok(keys)
}

/// Generate a fresh 32-byte salt.
///
/// The random bytes are XOR-mixed with a digest of the wall clock and the
/// process id.  The mixing is advisory; the CSPRNG output alone is enough.
pub fn generate_salt(rng: &mut dyn RandomSource, now_ms: i64) -> Result<[u8; SALT_LEN]> {
    let mut salt: [u8; SALT_LEN] = random_array(rng)?;

    let mut hasher = Sha256::new();
    hasher.update(now_ms.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let extra = hasher.finalize();

    for (byte, mix) in salt.iter_mut().zip(extra.iter()) {
        *byte ^= mix;
    }
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::OsRandom;

    #[test]
    fn short_passphrase_rejected_before_derivation() {
        let salt = [7u8; SALT_LEN];
        let err = derive_keys("1234567", &salt, &KdfParams::default()).unwrap_err();
        assert!(matches!(err, VaultError::WeakPassphrase { min: 8 }));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // Eight characters, sixteen bytes.
        assert!(check_passphrase("пппппппп").is_ok());
        assert!(check_passphrase("ппппппп").is_err());
    }

    #[test]
    fn low_iteration_count_rejected() {
        let params = KdfParams { iterations: 1_000 };
        assert!(matches!(
            params.validate(),
            Err(VaultError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn excessive_iteration_count_rejected() {
        let params = KdfParams {
            iterations: MAX_ITERATIONS + 1,
        };
        assert!(matches!(
            params.validate(),
            Err(VaultError::KeyDerivationFailed(_))
        ));
    }

    #[test]
    fn cipher_and_mac_keys_differ() {
        let salt = [0x42u8; SALT_LEN];
        let mut salt_asym = salt;
        salt_asym[0] = 1;
        let keys = derive_keys("correct-horse", &salt_asym, &KdfParams::default()).unwrap();
        assert_ne!(keys.cipher_key(), keys.mac_key());
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = generate_salt(&mut OsRandom, 1_700_000_000_000).unwrap();
        let a = derive_keys("correct-horse", &salt, &KdfParams::default()).unwrap();
        let b = derive_keys("correct-horse", &salt, &KdfParams::default()).unwrap();
        assert_eq!(a.cipher_key(), b.cipher_key());
        assert_eq!(a.mac_key(), b.mac_key());
    }

    #[test]
    fn salts_are_unique() {
        let a = generate_salt(&mut OsRandom, 0).unwrap();
        let b = generate_salt(&mut OsRandom, 0).unwrap();
        assert_ne!(a, b);
    }
}
