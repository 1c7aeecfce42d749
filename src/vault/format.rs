//! Document field layout of a vault.
//!
//! A vault lives in a flat key-value document where every value is a
//! string:
//!
//! ```text
//! secrets-salt              base64, 32 bytes
//! secrets-verification      cipher record of VERIFICATION_TEXT
//! secrets-version           "3.0" (current) or "2.0" (legacy)
//! secrets-kdf-iterations    PBKDF2 iteration count (absent = 600000)
//! secret-<key>              cipher record of the value
//! meta-<key>                JSON {created, modified, originalName?}
//! username-<key>            cipher record (optional)
//! description-<key>         cipher record (optional)
//! ```
//!
//! `<key>` is the encoded secret name.  Legacy documents may also use the
//! raw (sanitized) name as the key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::codec::{decode_blob, encode_blob};
use crate::crypto::encryption::CipherRecord;
use crate::crypto::kdf::{KdfParams, DEFAULT_ITERATIONS, MAX_ITERATIONS, SALT_LEN};
use crate::errors::{Result, VaultError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FIELD_SALT: &str = "secrets-salt";
pub const FIELD_VERIFICATION: &str = "secrets-verification";
pub const FIELD_VERSION: &str = "secrets-version";
pub const FIELD_KDF_ITERATIONS: &str = "secrets-kdf-iterations";

pub const SECRET_PREFIX: &str = "secret-";
pub const META_PREFIX: &str = "meta-";
pub const USERNAME_PREFIX: &str = "username-";
pub const DESCRIPTION_PREFIX: &str = "description-";

/// Plaintext of the verification record.  Shared with documents written by
/// earlier releases, so it must never change.
pub const VERIFICATION_TEXT: &str = "TW5_SECRETS_VAULT_V2_VERIFIED";

/// A vault document: field name -> string value.
pub type Fields = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// FormatVersion
// ---------------------------------------------------------------------------

/// Stored format flag.  Legacy fallbacks are only honoured for `Legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// `"2.0"` or missing: raw field names and plaintext usernames may exist.
    Legacy,
    /// `"3.0"`: every key is encoded, every optional field is encrypted.
    Current,
}

impl FormatVersion {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("3.0") => FormatVersion::Current,
            _ => FormatVersion::Legacy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FormatVersion::Legacy => "2.0",
            FormatVersion::Current => "3.0",
        }
    }

    pub fn is_legacy(self) -> bool {
        self == FormatVersion::Legacy
    }
}

// ---------------------------------------------------------------------------
// VaultHeader
// ---------------------------------------------------------------------------

/// The vault-level fields: salt, verification record, version, KDF params.
#[derive(Debug, Clone)]
pub struct VaultHeader {
    pub salt: [u8; SALT_LEN],
    pub verification: CipherRecord,
    pub version: FormatVersion,
    pub kdf: KdfParams,
}

impl VaultHeader {
    /// Read the header from a document.
    ///
    /// Returns `Ok(None)` when the salt or the verification record is
    /// missing, which means the vault was never initialized.
    pub fn read(fields: &Fields) -> Result<Option<Self>> {
        let (Some(salt_text), Some(verification_text)) =
            (fields.get(FIELD_SALT), fields.get(FIELD_VERIFICATION))
        else {
            return Ok(None);
        };

        let salt_bytes = decode_blob(salt_text)?;
        let salt: [u8; SALT_LEN] = salt_bytes.as_slice().try_into().map_err(|_| {
            VaultError::InvalidEncoding(format!(
                "salt is {} bytes, expected {SALT_LEN}",
                salt_bytes.len()
            ))
        })?;

        let verification = CipherRecord::from_base64(verification_text)?;

        let iterations = match fields.get(FIELD_KDF_ITERATIONS) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                VaultError::InvalidEncoding(format!("bad KDF iteration count '{raw}'"))
            })?,
            None => DEFAULT_ITERATIONS,
        };
        if iterations > MAX_ITERATIONS {
            return Err(VaultError::InvalidEncoding(format!(
                "KDF iteration count {iterations} exceeds {MAX_ITERATIONS}"
            )));
        }

        Ok(Some(Self {
            salt,
            verification,
            version: FormatVersion::parse(fields.get(FIELD_VERSION).map(String::as_str)),
            kdf: KdfParams { iterations },
        }))
    }

    /// Write the header fields into `fields`, replacing any previous values.
    pub fn write_into(&self, fields: &mut Fields) {
        fields.insert(FIELD_SALT.into(), encode_blob(&self.salt));
        fields.insert(FIELD_VERIFICATION.into(), self.verification.to_base64());
        fields.insert(FIELD_VERSION.into(), self.version.as_str().into());
        fields.insert(
            FIELD_KDF_ITERATIONS.into(),
            self.kdf.iterations.to_string(),
        );
    }
}

// ---------------------------------------------------------------------------
// SecretMeta
// ---------------------------------------------------------------------------

/// Per-secret metadata, stored as JSON in `meta-<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMeta {
    /// Creation time, Unix milliseconds.
    pub created: i64,

    /// Last modification time, Unix milliseconds.
    pub modified: i64,

    /// Display name; absent in documents written by legacy releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl SecretMeta {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultError::SerializationError(format!("secret metadata: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Field names for one record
// ---------------------------------------------------------------------------

/// The four document fields belonging to one storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    pub key: String,
    pub secret: String,
    pub meta: String,
    pub username: String,
    pub description: String,
}

impl RecordFields {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            secret: format!("{SECRET_PREFIX}{key}"),
            meta: format!("{META_PREFIX}{key}"),
            username: format!("{USERNAME_PREFIX}{key}"),
            description: format!("{DESCRIPTION_PREFIX}{key}"),
        }
    }

    pub fn all(&self) -> [&str; 4] {
        [
            self.secret.as_str(),
            self.meta.as_str(),
            self.username.as_str(),
            self.description.as_str(),
        ]
    }

    /// Parsed metadata, if present and well-formed.
    pub fn meta_in(&self, fields: &Fields) -> Option<SecretMeta> {
        fields.get(&self.meta).and_then(|raw| SecretMeta::parse(raw))
    }
}

/// Whether `name` is a field the vault owns (header or record field).
pub fn is_vault_field(name: &str) -> bool {
    matches!(
        name,
        FIELD_SALT | FIELD_VERIFICATION | FIELD_VERSION | FIELD_KDF_ITERATIONS
    ) || [SECRET_PREFIX, META_PREFIX, USERNAME_PREFIX, DESCRIPTION_PREFIX]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// The key legacy releases used for `name`: the name with every character
/// outside `[A-Za-z0-9-_ ]` stripped.
pub fn legacy_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parsing() {
        assert_eq!(FormatVersion::parse(Some("3.0")), FormatVersion::Current);
        assert_eq!(FormatVersion::parse(Some("2.0")), FormatVersion::Legacy);
        assert_eq!(FormatVersion::parse(None), FormatVersion::Legacy);
    }

    #[test]
    fn header_absent_means_uninitialized() {
        let fields = Fields::new();
        assert!(VaultHeader::read(&fields).unwrap().is_none());

        let mut only_salt = Fields::new();
        only_salt.insert(FIELD_SALT.into(), encode_blob(&[0u8; SALT_LEN]));
        assert!(VaultHeader::read(&only_salt).unwrap().is_none());
    }

    #[test]
    fn header_rejects_short_salt() {
        let mut fields = Fields::new();
        fields.insert(FIELD_SALT.into(), encode_blob(&[0u8; 16]));
        fields.insert(
            FIELD_VERIFICATION.into(),
            encode_blob(&[0u8; CipherRecord::MIN_LEN]),
        );
        assert!(matches!(
            VaultHeader::read(&fields),
            Err(VaultError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn header_roundtrip_defaults_iterations() {
        let mut fields = Fields::new();
        fields.insert(FIELD_SALT.into(), encode_blob(&[9u8; SALT_LEN]));
        fields.insert(
            FIELD_VERIFICATION.into(),
            encode_blob(&[1u8; CipherRecord::MIN_LEN]),
        );
        fields.insert(FIELD_VERSION.into(), "2.0".into());

        let header = VaultHeader::read(&fields).unwrap().unwrap();
        assert_eq!(header.kdf.iterations, DEFAULT_ITERATIONS);
        assert_eq!(header.version, FormatVersion::Legacy);

        let mut written = Fields::new();
        header.write_into(&mut written);
        assert_eq!(written.get(FIELD_VERSION).unwrap(), "2.0");
        assert_eq!(written.get(FIELD_KDF_ITERATIONS).unwrap(), "600000");
    }

    #[test]
    fn header_rejects_excessive_iterations() {
        let mut fields = Fields::new();
        fields.insert(FIELD_SALT.into(), encode_blob(&[9u8; SALT_LEN]));
        fields.insert(
            FIELD_VERIFICATION.into(),
            encode_blob(&[1u8; CipherRecord::MIN_LEN]),
        );
        fields.insert(FIELD_KDF_ITERATIONS.into(), "4294967295".into());

        assert!(matches!(
            VaultHeader::read(&fields),
            Err(VaultError::InvalidEncoding(_))
        ));

        fields.insert(FIELD_KDF_ITERATIONS.into(), MAX_ITERATIONS.to_string());
        let header = VaultHeader::read(&fields).unwrap().unwrap();
        assert_eq!(header.kdf.iterations, MAX_ITERATIONS);
    }

    #[test]
    fn meta_json_uses_original_name_key() {
        let meta = SecretMeta {
            created: 1,
            modified: 2,
            original_name: Some("my key".into()),
        };
        let json = meta.to_json().unwrap();
        assert!(json.contains("\"originalName\":\"my key\""));
        assert_eq!(SecretMeta::parse(&json), Some(meta));

        // Legacy metadata carries no originalName.
        let legacy = SecretMeta::parse(r#"{"created":5,"modified":6}"#).unwrap();
        assert_eq!(legacy.original_name, None);
    }

    #[test]
    fn vault_field_classification() {
        assert!(is_vault_field("secrets-salt"));
        assert!(is_vault_field("secret-Z2l0aHVi"));
        assert!(is_vault_field("description-abc"));
        assert!(!is_vault_field("title"));
        assert!(!is_vault_field("tags"));
    }

    #[test]
    fn legacy_key_strips_unsafe_characters() {
        assert_eq!(legacy_key("my.api/key 2"), "myapikey 2");
        assert_eq!(legacy_key("github"), "github");
    }
}
