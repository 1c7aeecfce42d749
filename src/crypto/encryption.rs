//! Authenticated encryption of single secret values.
//!
//! Each call to `encrypt` draws a fresh random 16-byte nonce, prefixes the
//! plaintext with a millisecond timestamp, encrypts it with AES-256-GCM and
//! signs `nonce || ciphertext` with a separate HMAC-SHA256 key.
//!
//! Layout of a cipher record:
//!   [ 32-byte HMAC tag | 16-byte nonce | ciphertext + 16-byte GCM tag ]
//!
//! `decrypt` verifies the HMAC in constant time before the AEAD is ever
//! touched.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use super::codec::{decode_blob, encode_blob};
use super::kdf::DerivedKeys;
use super::random::{random_array, RandomSource};
use crate::errors::{Result, VaultError};

/// AES-256-GCM with a 128-bit nonce.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

type HmacSha256 = Hmac<Sha256>;

/// Size of the HMAC-SHA256 tag at the front of every record.
pub const TAG_LEN: usize = 32;

/// Size of the AES-GCM nonce.
pub const NONCE_LEN: usize = 16;

/// Size of the GCM authentication tag appended to the ciphertext.
const GCM_TAG_LEN: usize = 16;

/// Records older than this are still returned, but logged.
pub const STALE_AFTER_MS: i64 = 24 * 60 * 60 * 1000;

/// Separates the timestamp prefix from the value inside the plaintext.
const TIMESTAMP_SEPARATOR: char = '|';

/// An encrypted, self-describing blob: `tag || nonce || ciphertext`.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherRecord {
    bytes: Vec<u8>,
}

impl CipherRecord {
    /// Minimum length of a well-formed record (empty ciphertext body).
    pub const MIN_LEN: usize = TAG_LEN + NONCE_LEN + GCM_TAG_LEN;

    /// Wrap raw bytes, checking only that the fixed-size regions fit.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(VaultError::InvalidEncoding(format!(
                "cipher record is {} bytes, expected at least {}",
                bytes.len(),
                Self::MIN_LEN
            )));
        }
        Ok(Self { bytes })
    }

    /// Parse a record from its stored text form.
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(decode_blob(text)?)
    }

    /// Text form for storage in a document field.
    pub fn to_base64(&self) -> String {
        encode_blob(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn tag(&self) -> &[u8] {
        &self.bytes[..TAG_LEN]
    }

    /// The region covered by the HMAC: `nonce || ciphertext`.
    fn signed(&self) -> &[u8] {
        &self.bytes[TAG_LEN..]
    }

    fn nonce(&self) -> &[u8] {
        &self.bytes[TAG_LEN..TAG_LEN + NONCE_LEN]
    }

    fn ciphertext(&self) -> &[u8] {
        &self.bytes[TAG_LEN + NONCE_LEN..]
    }
}

impl std::fmt::Debug for CipherRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CipherRecord({} bytes)", self.bytes.len())
    }
}

/// Encrypt `plaintext` under `keys`, stamping it with `now_ms`.
pub fn encrypt(
    keys: &DerivedKeys,
    rng: &mut dyn RandomSource,
    now_ms: i64,
    plaintext: &str,
) -> Result<CipherRecord> {
    let cipher = <Aes256Gcm16 as KeyInit>::new_from_slice(keys.cipher_key())
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce_bytes: [u8; NONCE_LEN] = random_array(rng)?;
    let nonce = Nonce::<U16>::from_slice(&nonce_bytes);

    let stamped = Zeroizing::new(format!("{now_ms}{TIMESTAMP_SEPARATOR}{plaintext}"));
    let ciphertext = cipher
        .encrypt(nonce, stamped.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut bytes = Vec::with_capacity(TAG_LEN + NONCE_LEN + ciphertext.len());
    bytes.extend_from_slice(&[0u8; TAG_LEN]);
    bytes.extend_from_slice(&nonce_bytes);
    bytes.extend_from_slice(&ciphertext);

    let tag = sign(keys.mac_key(), &bytes[TAG_LEN..])?;
    bytes[..TAG_LEN].copy_from_slice(&tag);

    Ok(CipherRecord { bytes })
}

/// Verify and decrypt a record produced by [`encrypt`].
///
/// Fails with `Tampered` if the HMAC does not match (wrong key or altered
/// bytes) and with `DecryptFailed` if the AEAD rejects a record whose HMAC
/// did verify.
pub fn decrypt(keys: &DerivedKeys, record: &CipherRecord, now_ms: i64) -> Result<String> {
    verify(keys.mac_key(), record.signed(), record.tag())?;

    let cipher = <Aes256Gcm16 as KeyInit>::new_from_slice(keys.cipher_key())
        .map_err(|_| VaultError::DecryptFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::<U16>::from_slice(record.nonce()), record.ciphertext())
        .map_err(|_| VaultError::DecryptFailed)?;

    let stamped = Zeroizing::new(String::from_utf8(plaintext).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        VaultError::InvalidEncoding("decrypted value is not valid UTF-8".into())
    })?);

    let (stamp, value) = stamped
        .split_once(TIMESTAMP_SEPARATOR)
        .ok_or_else(|| VaultError::InvalidEncoding("missing timestamp prefix".into()))?;
    let stamp: i64 = stamp
        .parse()
        .map_err(|_| VaultError::InvalidEncoding("malformed timestamp prefix".into()))?;

    let age_ms = now_ms.saturating_sub(stamp);
    if age_ms > STALE_AFTER_MS {
        tracing::warn!(age_ms, "decrypted data is older than 24 hours");
    }

    Ok(value.to_string())
}

/// Decode a stored field and decrypt it in one step.
pub fn decrypt_field(keys: &DerivedKeys, text: &str, now_ms: i64) -> Result<String> {
    let record = CipherRecord::from_base64(text)?;
    decrypt(keys, &record, now_ms)
}

fn sign(mac_key: &[u8], data: &[u8]) -> Result<[u8; TAG_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| VaultError::EncryptionFailed(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Constant-time tag check via `Mac::verify_slice`.
fn verify(mac_key: &[u8], data: &[u8], tag: &[u8]) -> Result<()> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key).map_err(|_| VaultError::Tampered)?;
    mac.update(data);
    mac.verify_slice(tag).map_err(|_| VaultError::Tampered)
}
