use thiserror::Error;

/// All errors that can occur in DocVault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Passphrase / session errors ---
    #[error("Passphrase too short — at least {min} characters are required")]
    WeakPassphrase { min: usize },

    #[error("Vault not initialized — set a password first")]
    VaultNotInitialized,

    #[error("Too many attempts. Try again in {remaining_secs} seconds")]
    LockedOut { remaining_secs: u64 },

    #[error("Invalid password ({remaining_attempts} attempt(s) left before lockout)")]
    InvalidPassphrase { remaining_attempts: u32 },

    #[error("Vault is locked")]
    VaultLocked,

    // --- Record errors ---
    #[error("Secret '{0}' not found")]
    RecordNotFound(String),

    #[error("Secret '{0}' already exists (use `update` to change it)")]
    RecordAlreadyExists(String),

    #[error("Invalid secret name: {0}")]
    InvalidSecretName(String),

    // --- Crypto errors ---
    #[error("Integrity check failed — stored data was tampered with or the key is wrong")]
    Tampered,

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptFailed,

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Secure random source unavailable: {0}")]
    RandomUnavailable(String),

    // --- Storage / config errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Convenience type alias for DocVault results.
pub type Result<T> = std::result::Result<T, VaultError>;

impl VaultError {
    /// Errors that mean stored ciphertext could not be trusted or opened.
    /// The vault locks itself when one of these surfaces.
    pub fn is_crypto_failure(&self) -> bool {
        matches!(
            self,
            VaultError::Tampered
                | VaultError::DecryptFailed
                | VaultError::InvalidEncoding(_)
                | VaultError::EncryptionFailed(_)
                | VaultError::RandomUnavailable(_)
        )
    }
}
