//! Cryptographic primitives for DocVault.
//!
//! This module provides:
//! - Base64 codecs for blobs and reversible secret-name encoding (`codec`)
//! - PBKDF2-HMAC-SHA256 derivation of the cipher/MAC key pair (`kdf`)
//! - AES-256-GCM + HMAC-SHA256 cipher records (`encryption`)
//! - The pluggable secure random source (`random`)

pub mod codec;
pub mod encryption;
pub mod kdf;
pub mod random;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_keys, ...};
pub use codec::{decode_blob, decode_name, encode_blob, encode_name};
pub use encryption::{decrypt, decrypt_field, encrypt, CipherRecord};
pub use kdf::{derive_keys, generate_salt, DerivedKeys, KdfParams, MIN_PASSPHRASE_LEN};
pub use random::{OsRandom, RandomSource};
