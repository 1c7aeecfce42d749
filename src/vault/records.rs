//! Secret records inside a vault document.
//!
//! Everything here works on an in-memory [`Fields`] map; the caller loads
//! the document, applies one operation and writes the result back in a
//! single `replace`.  Keys and randomness come in through [`Crypt`].

use std::collections::BTreeMap;

use zeroize::Zeroizing;

use super::format::{
    is_vault_field, legacy_key, Fields, FormatVersion, RecordFields, SecretMeta, SECRET_PREFIX,
};
use crate::crypto::codec::{decode_name, encode_name};
use crate::crypto::encryption::{decrypt_field, encrypt};
use crate::crypto::kdf::DerivedKeys;
use crate::crypto::random::RandomSource;
use crate::errors::{Result, VaultError};

/// Longest accepted secret name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// What an operation needs to encrypt or decrypt record fields.
pub struct Crypt<'a> {
    pub keys: &'a DerivedKeys,
    pub rng: &'a mut dyn RandomSource,
    pub now_ms: i64,
    pub version: FormatVersion,
}

impl Crypt<'_> {
    fn seal(&mut self, plaintext: &str) -> Result<String> {
        Ok(encrypt(self.keys, &mut *self.rng, self.now_ms, plaintext)?.to_base64())
    }

    fn open(&self, stored: &str) -> Result<String> {
        decrypt_field(self.keys, stored, self.now_ms)
    }
}

/// Lightweight listing entry (no decrypted values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub name: String,
    pub created_ms: i64,
    pub modified_ms: i64,
}

/// Which optional text field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalField {
    Username,
    Description,
}

impl OptionalField {
    fn field_name(self, record: &RecordFields) -> &str {
        match self {
            OptionalField::Username => &record.username,
            OptionalField::Description => &record.description,
        }
    }
}

/// An optional field after trial decryption.
///
/// Legacy documents stored usernames in the clear; in those documents a
/// value that fails to decrypt is taken verbatim.  Current documents never
/// fall back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedText {
    Decrypted(String),
    LegacyPlaintext(String),
}

impl ResolvedText {
    /// Decide what a stored optional value is.  Done once per read.
    pub fn resolve(cx: &Crypt<'_>, stored: &str) -> Result<Self> {
        match cx.open(stored) {
            Ok(plain) => Ok(ResolvedText::Decrypted(plain)),
            Err(_) if cx.version.is_legacy() => {
                Ok(ResolvedText::LegacyPlaintext(stored.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn into_inner(self) -> String {
        match self {
            ResolvedText::Decrypted(text) | ResolvedText::LegacyPlaintext(text) => text,
        }
    }
}

// ---------------------------------------------------------------------------
// Name handling
// ---------------------------------------------------------------------------

/// Validate that a secret name is usable.
///
/// Any Unicode is allowed; the name must not be blank and must stay
/// within [`MAX_NAME_LEN`] characters.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(VaultError::InvalidSecretName(
            "secret name cannot be empty".into(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(VaultError::InvalidSecretName(format!(
            "secret name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// The legacy raw-key record for `name`, if the document is legacy and one
/// exists that is not claimed by a different secret.
fn legacy_record(fields: &Fields, name: &str, version: FormatVersion) -> Option<RecordFields> {
    if !version.is_legacy() {
        return None;
    }
    let key = legacy_key(name);
    if key.is_empty() || key == encode_name(name) {
        return None;
    }
    let record = RecordFields::new(&key);
    if !fields.contains_key(&record.secret) {
        return None;
    }
    match record.meta_in(fields).and_then(|m| m.original_name) {
        Some(owner) if owner != name => None,
        _ => Some(record),
    }
}

/// The encoded-key record for `name`, if one exists and belongs to it.
///
/// Legacy raw keys share the base64url alphabet, so in a legacy document
/// an encoded-looking key only counts when its `originalName` says so.
fn encoded_record(fields: &Fields, name: &str, version: FormatVersion) -> Option<RecordFields> {
    let record = RecordFields::new(&encode_name(name));
    if !fields.contains_key(&record.secret) {
        return None;
    }
    match record.meta_in(fields).and_then(|m| m.original_name) {
        Some(owner) if owner == name => Some(record),
        Some(_) => None,
        None if version.is_legacy() => None,
        None => Some(record),
    }
}

/// Find the stored record for `name`: encoded form first, then legacy.
pub fn locate(fields: &Fields, name: &str, version: FormatVersion) -> Option<RecordFields> {
    encoded_record(fields, name, version).or_else(|| legacy_record(fields, name, version))
}

fn locate_or_missing(fields: &Fields, name: &str, version: FormatVersion) -> Result<RecordFields> {
    locate(fields, name, version).ok_or_else(|| VaultError::RecordNotFound(name.to_string()))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Create a new record.  Fails if `name` already exists in any form.
pub fn add(
    fields: &mut Fields,
    cx: &mut Crypt<'_>,
    name: &str,
    value: &str,
    username: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    validate_name(name)?;
    if locate(fields, name, cx.version).is_some() {
        return Err(VaultError::RecordAlreadyExists(name.to_string()));
    }

    let record = RecordFields::new(&encode_name(name));
    if fields.contains_key(&record.secret) {
        // A legacy raw key that happens to spell this name's encoding.
        return Err(VaultError::InvalidSecretName(format!(
            "storage key for '{name}' is held by legacy secret '{}'; change the password to migrate first",
            record.key
        )));
    }

    // Encrypt everything before touching the map.
    let sealed_value = cx.seal(value)?;
    let sealed_username = match username.filter(|u| !u.is_empty()) {
        Some(u) => Some(cx.seal(u)?),
        None => None,
    };
    let sealed_description = match description.filter(|d| !d.is_empty()) {
        Some(d) => Some(cx.seal(d)?),
        None => None,
    };
    let meta = SecretMeta {
        created: cx.now_ms,
        modified: cx.now_ms,
        original_name: Some(name.to_string()),
    }
    .to_json()?;

    fields.insert(record.secret.clone(), sealed_value);
    fields.insert(record.meta.clone(), meta);
    if let Some(u) = sealed_username {
        fields.insert(record.username.clone(), u);
    }
    if let Some(d) = sealed_description {
        fields.insert(record.description.clone(), d);
    }
    Ok(())
}

/// Decrypt the value of `name`.
pub fn get_value(fields: &Fields, cx: &Crypt<'_>, name: &str) -> Result<String> {
    let record = locate_or_missing(fields, name, cx.version)?;
    let stored = fields
        .get(&record.secret)
        .ok_or_else(|| VaultError::RecordNotFound(name.to_string()))?;
    cx.open(stored)
}

/// Read an optional field of `name`; `None` when the field is absent.
pub fn get_optional(
    fields: &Fields,
    cx: &Crypt<'_>,
    name: &str,
    which: OptionalField,
) -> Result<Option<String>> {
    let record = locate_or_missing(fields, name, cx.version)?;
    match fields.get(which.field_name(&record)) {
        None => Ok(None),
        Some(stored) => Ok(Some(ResolvedText::resolve(cx, stored)?.into_inner())),
    }
}

/// Change an existing record in place.
///
/// For `username` and `description`: `None` leaves the field unchanged,
/// `Some("")` clears it, anything else replaces it.
pub fn update(
    fields: &mut Fields,
    cx: &mut Crypt<'_>,
    name: &str,
    value: &str,
    username: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let record = locate_or_missing(fields, name, cx.version)?;

    let sealed_value = cx.seal(value)?;
    let sealed_username = seal_update(cx, username)?;
    let sealed_description = seal_update(cx, description)?;

    let created = record
        .meta_in(fields)
        .map_or(cx.now_ms, |existing| existing.created);
    let meta = SecretMeta {
        created,
        modified: cx.now_ms,
        original_name: Some(name.to_string()),
    }
    .to_json()?;

    fields.insert(record.secret.clone(), sealed_value);
    fields.insert(record.meta.clone(), meta);
    apply_update(fields, &record.username, sealed_username);
    apply_update(fields, &record.description, sealed_description);
    Ok(())
}

/// `None` = unchanged, `Some(None)` = clear, `Some(Some(v))` = set.
fn seal_update(cx: &mut Crypt<'_>, input: Option<&str>) -> Result<Option<Option<String>>> {
    match input {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(text) => Ok(Some(Some(cx.seal(text)?))),
    }
}

fn apply_update(fields: &mut Fields, field: &str, change: Option<Option<String>>) {
    match change {
        None => {}
        Some(None) => {
            fields.remove(field);
        }
        Some(Some(sealed)) => {
            fields.insert(field.to_string(), sealed);
        }
    }
}

/// Remove every field of `name`, in both encoded and legacy form.
pub fn delete(fields: &mut Fields, name: &str, version: FormatVersion) -> Result<()> {
    let mut removed = false;

    let targets: Vec<RecordFields> = encoded_record(fields, name, version)
        .into_iter()
        .chain(legacy_record(fields, name, version))
        .collect();

    for record in &targets {
        for field in record.all() {
            removed |= fields.remove(field).is_some();
        }
    }

    if removed {
        Ok(())
    } else {
        Err(VaultError::RecordNotFound(name.to_string()))
    }
}

/// Display name for a stored key.
///
/// Prefers `originalName` from metadata; legacy documents without it use
/// the raw key, current documents decode the key.
fn display_name(fields: &Fields, record: &RecordFields, version: FormatVersion) -> String {
    if let Some(name) = record.meta_in(fields).and_then(|m| m.original_name) {
        return name;
    }
    if version.is_legacy() {
        return record.key.clone();
    }
    decode_name(&record.key).unwrap_or_else(|| record.key.clone())
}

/// Every stored record: logical names, deduplicated and sorted.
pub fn list(fields: &Fields, version: FormatVersion) -> Vec<SecretEntry> {
    let mut entries: BTreeMap<String, SecretEntry> = BTreeMap::new();

    for key in fields
        .keys()
        .filter_map(|field| field.strip_prefix(SECRET_PREFIX))
    {
        let record = RecordFields::new(key);
        let name = display_name(fields, &record, version);
        let meta = record.meta_in(fields);
        entries.entry(name.clone()).or_insert_with(|| SecretEntry {
            name,
            created_ms: meta.as_ref().map_or(0, |m| m.created),
            modified_ms: meta.as_ref().map_or(0, |m| m.modified),
        });
    }

    entries.into_values().collect()
}

// ---------------------------------------------------------------------------
// Re-keying
// ---------------------------------------------------------------------------

/// One record with every field decrypted.  Plaintext is wiped on drop.
pub struct PlainRecord {
    name: String,
    value: Zeroizing<String>,
    username: Option<Zeroizing<String>>,
    description: Option<Zeroizing<String>>,
    created_ms: i64,
}

/// Decrypt every record under the current keys.  Any value that fails to
/// decrypt aborts the whole pass.
pub fn decrypt_all(fields: &Fields, cx: &Crypt<'_>) -> Result<Vec<PlainRecord>> {
    let mut plain = Vec::new();

    for key in fields
        .keys()
        .filter_map(|field| field.strip_prefix(SECRET_PREFIX))
    {
        let record = RecordFields::new(key);
        let stored = &fields[&record.secret];
        let value = Zeroizing::new(cx.open(stored)?);

        let resolve = |field: &str| -> Result<Option<Zeroizing<String>>> {
            match fields.get(field) {
                None => Ok(None),
                Some(stored) => Ok(Some(Zeroizing::new(
                    ResolvedText::resolve(cx, stored)?.into_inner(),
                ))),
            }
        };
        let username = resolve(&record.username)?;
        let description = resolve(&record.description)?;

        plain.push(PlainRecord {
            name: display_name(fields, &record, cx.version),
            value,
            username,
            description,
            created_ms: record.meta_in(fields).map_or(cx.now_ms, |m| m.created),
        });
    }

    Ok(plain)
}

/// Encrypt `records` under the keys in `cx` into `out`, always using the
/// encoded key form.
pub fn encrypt_all(records: &[PlainRecord], cx: &mut Crypt<'_>, out: &mut Fields) -> Result<()> {
    for plain in records {
        let record = RecordFields::new(&encode_name(&plain.name));

        out.insert(record.secret.clone(), cx.seal(&plain.value)?);
        if let Some(username) = plain.username.as_ref().filter(|u| !u.is_empty()) {
            out.insert(record.username.clone(), cx.seal(username)?);
        }
        if let Some(description) = plain.description.as_ref().filter(|d| !d.is_empty()) {
            out.insert(record.description.clone(), cx.seal(description)?);
        }
        let meta = SecretMeta {
            created: plain.created_ms,
            modified: cx.now_ms,
            original_name: Some(plain.name.clone()),
        };
        out.insert(record.meta.clone(), meta.to_json()?);
    }
    Ok(())
}

/// Fields of the document the vault does not own.
pub fn foreign_fields(fields: &Fields) -> Fields {
    fields
        .iter()
        .filter(|(name, _)| !is_vault_field(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
