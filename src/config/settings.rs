use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{KdfParams, DEFAULT_ITERATIONS, MAX_ITERATIONS};
use crate::errors::{Result, VaultError};

/// Project-level configuration, loaded from `.docvault.toml`.
///
/// Every field has a sensible default so DocVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Minutes of inactivity before an unlocked vault locks itself
    /// (0 disables auto-lock).
    #[serde(default = "default_auto_lock_minutes")]
    pub auto_lock_minutes: u64,

    /// Seconds a revealed secret stays on screen (0 keeps it).
    #[serde(default = "default_auto_hide_seconds")]
    pub auto_hide_seconds: u64,

    /// PBKDF2 iteration count used for new keys.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Vault document path, relative to the project root.
    #[serde(default = "default_document")]
    pub document: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_auto_lock_minutes() -> u64 {
    10
}

fn default_auto_hide_seconds() -> u64 {
    8
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_document() -> String {
    ".docvault/vault.json".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_lock_minutes: default_auto_lock_minutes(),
            auto_hide_seconds: default_auto_hide_seconds(),
            kdf_iterations: default_kdf_iterations(),
            document: default_document(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".docvault.toml";

    /// Load settings from `<project_dir>/.docvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, or asks for a KDF
    /// iteration count outside the accepted range, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if !(DEFAULT_ITERATIONS..=MAX_ITERATIONS).contains(&settings.kdf_iterations) {
            return Err(VaultError::ConfigError(format!(
                "kdf_iterations must be between {DEFAULT_ITERATIONS} and {MAX_ITERATIONS} (got {})",
                settings.kdf_iterations
            )));
        }

        tracing::debug!(path = %config_path.display(), "loaded settings");
        Ok(settings)
    }

    /// Inactivity timeout, or `None` when auto-lock is disabled.
    pub fn auto_lock(&self) -> Option<Duration> {
        (self.auto_lock_minutes > 0)
            .then(|| Duration::from_secs(self.auto_lock_minutes.saturating_mul(60)))
    }

    /// How long a revealed value stays visible, or `None` to keep it.
    pub fn auto_hide(&self) -> Option<Duration> {
        (self.auto_hide_seconds > 0).then(|| Duration::from_secs(self.auto_hide_seconds))
    }

    /// Key-derivation parameters for new keys.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf_iterations,
        }
    }

    /// Full path to the vault document.
    ///
    /// Example: `project_dir/.docvault/vault.json`
    pub fn document_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.document)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
