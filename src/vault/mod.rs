//! Vault module — passphrase-protected secret storage.
//!
//! This module provides:
//! - Document field names, header and per-secret metadata (`format`)
//! - The document persistence seam and its two backends (`store`)
//! - Lockout counter, session keys and the clock seam (`session`)
//! - Per-secret record operations over a field map (`records`)
//! - Lock-state and record-change signals (`events`)
//! - The `Vault` state machine tying them together (`state`)

pub mod events;
pub mod format;
pub mod records;
pub mod session;
pub mod state;
pub mod store;

// Re-export the most commonly used items.
pub use events::{EventLog, NoopListener, VaultEvent, VaultListener};
pub use format::{Fields, FormatVersion, VaultHeader};
pub use records::SecretEntry;
pub use session::{Clock, SystemClock, LOCKOUT_MS, MAX_ATTEMPTS};
pub use state::{Vault, VaultStatus};
pub use store::{FieldStore, JsonFileStore, MemoryStore};
