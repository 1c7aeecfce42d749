//! Persistence of the vault document.
//!
//! The vault never writes a document partially: every mutating operation
//! loads the full field map, edits it in memory and hands the result back
//! through [`FieldStore::replace`], which must be atomic.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::format::Fields;
use crate::errors::{Result, VaultError};

/// A key-value document with string fields.
pub trait FieldStore {
    /// Read every field of the document.  A missing document is empty.
    fn load(&self) -> Result<Fields>;

    /// Replace the whole document atomically.
    fn replace(&mut self, fields: Fields) -> Result<()>;

    /// Read a single field.
    fn read_field(&self, name: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(name))
    }

    /// Write a single field, keeping the rest of the document.
    fn write_field(&mut self, name: &str, value: &str) -> Result<()> {
        let mut fields = self.load()?;
        fields.insert(name.to_string(), value.to_string());
        self.replace(fields)
    }

    /// Delete fields, keeping the rest of the document.
    fn delete_fields(&mut self, names: &[&str]) -> Result<()> {
        let mut fields = self.load()?;
        for name in names {
            fields.remove(*name);
        }
        self.replace(fields)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryInner {
    fields: Fields,
    fail_writes: bool,
}

/// In-process document.  Clones share the same underlying fields, so a
/// host can keep a handle while the vault owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of fields.
    pub fn with_fields(fields: Fields) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.fields = fields;
        }
        store
    }

    /// Make every subsequent `replace` fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    /// Snapshot of the current document.
    pub fn snapshot(&self) -> Fields {
        self.inner
            .lock()
            .map(|inner| inner.fields.clone())
            .unwrap_or_default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| VaultError::Storage("memory store lock poisoned".into()))
    }
}

impl FieldStore for MemoryStore {
    fn load(&self) -> Result<Fields> {
        Ok(self.guard()?.fields.clone())
    }

    fn replace(&mut self, fields: Fields) -> Result<()> {
        let mut inner = self.guard()?;
        if inner.fail_writes {
            return Err(VaultError::Storage("write rejected".into()));
        }
        inner.fields = fields;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// A document stored as a flat JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FieldStore for JsonFileStore {
    fn load(&self) -> Result<Fields> {
        if !self.path.exists() {
            return Ok(Fields::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            VaultError::Storage(format!("{} is not a vault document: {e}", self.path.display()))
        })
    }

    /// Write to a temp file in the same directory, then rename over the
    /// target so readers never see a half-written document.
    fn replace(&mut self, fields: Fields) -> Result<()> {
        let json = serde_json::to_vec_pretty(&fields)
            .map_err(|e| VaultError::SerializationError(format!("document: {e}")))?;

        let parent = self.path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}
