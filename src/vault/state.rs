//! The vault state machine.
//!
//! `Vault` owns the document store, the failed-attempt counter and, while
//! unlocked, the [`VaultSession`] holding the derived keys.  Every secret
//! operation goes through here so the session can be checked against its
//! inactivity deadline and discarded on failure.
//!
//! ```text
//! Uninitialized --set_password--> Unlocked
//! Locked        --unlock-------> Unlocked      (LockedOut while the window is open)
//! Unlocked      --lock/idle----> Locked
//! ```

use std::time::Duration;

use subtle::ConstantTimeEq;

use super::events::{NoopListener, VaultEvent, VaultListener};
use super::format::{Fields, FormatVersion, VaultHeader, VERIFICATION_TEXT};
use super::records::{self, Crypt, OptionalField, SecretEntry};
use super::session::{Clock, Lockout, SystemClock, VaultSession};
use super::store::FieldStore;
use crate::config::Settings;
use crate::crypto::encryption::{decrypt, encrypt};
use crate::crypto::kdf::{check_passphrase, derive_keys, generate_salt, DerivedKeys, KdfParams};
use crate::crypto::random::{OsRandom, RandomSource};
use crate::errors::{Result, VaultError};

/// Observable vault state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// No password has been set yet.
    Uninitialized,
    /// Initialized, keys not held.
    Locked,
    /// Locked and refusing unlock attempts for a while.
    LockedOut { remaining_secs: u64 },
    /// Keys are held in memory.
    Unlocked,
}

/// A passphrase-protected secret store over a [`FieldStore`].
pub struct Vault<S: FieldStore> {
    store: S,
    auto_lock: Option<Duration>,
    kdf: KdfParams,
    rng: Box<dyn RandomSource>,
    clock: Box<dyn Clock>,
    listener: Box<dyn VaultListener>,
    session: Option<VaultSession>,
    lockout: Lockout,
}

impl<S: FieldStore> Vault<S> {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a vault handle over `store` using the OS random source and
    /// the system clock.  The vault starts locked.
    pub fn new(store: S, settings: &Settings) -> Self {
        Self {
            store,
            auto_lock: settings.auto_lock(),
            kdf: settings.kdf_params(),
            rng: Box::new(OsRandom),
            clock: Box::new(SystemClock),
            listener: Box::new(NoopListener),
            session: None,
            lockout: Lockout::default(),
        }
    }

    /// Replace the random source.
    pub fn with_rng(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Subscribe to lock-state and record-change signals.
    pub fn with_listener(mut self, listener: impl VaultListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    // ------------------------------------------------------------------
    // State queries
    // ------------------------------------------------------------------

    pub fn status(&self) -> Result<VaultStatus> {
        let fields = self.store.load()?;
        if VaultHeader::read(&fields)?.is_none() {
            return Ok(VaultStatus::Uninitialized);
        }
        if self.is_unlocked() {
            return Ok(VaultStatus::Unlocked);
        }
        match self.lockout.check(self.clock.now_ms()) {
            Err(VaultError::LockedOut { remaining_secs }) => {
                Ok(VaultStatus::LockedOut { remaining_secs })
            }
            _ => Ok(VaultStatus::Locked),
        }
    }

    /// Whether keys are currently held.  Does not check the idle deadline;
    /// call [`poll_auto_lock`](Self::poll_auto_lock) for that.
    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(VaultHeader::read(&self.store.load()?)?.is_some())
    }

    pub fn failed_attempts(&self) -> u32 {
        self.lockout.failed_attempts()
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.lockout.remaining_attempts()
    }

    /// End of the current or most recent lockout window (Unix ms).
    pub fn locked_until_ms(&self) -> Option<i64> {
        self.lockout.locked_until_ms()
    }

    /// Inactivity deadline of the open session (Unix ms).
    pub fn auto_lock_deadline_ms(&self) -> Option<i64> {
        self.session.as_ref().and_then(VaultSession::deadline_ms)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Initialize (or destructively reset) the vault with `passphrase`.
    ///
    /// Any existing records are discarded: they cannot be read under the
    /// new salt.  Fields the vault does not own are kept.
    pub fn set_password(&mut self, passphrase: &str) -> Result<()> {
        self.end_session();
        check_passphrase(passphrase)?;

        let now = self.clock.now_ms();
        let loaded = self.store.load()?;
        if VaultHeader::read(&loaded).ok().flatten().is_some() {
            tracing::warn!("resetting an initialized vault; existing secrets are discarded");
        }

        let salt = generate_salt(&mut *self.rng, now)?;
        let keys = derive_keys(passphrase, &salt, &self.kdf)?;
        let header = VaultHeader {
            salt,
            verification: encrypt(&keys, &mut *self.rng, now, VERIFICATION_TEXT)?,
            version: FormatVersion::Current,
            kdf: self.kdf,
        };

        let mut fields = records::foreign_fields(&loaded);
        header.write_into(&mut fields);
        self.store.replace(fields)?;

        self.lockout.reset();
        self.start_session(keys, now);
        self.listener.notify(VaultEvent::RecordsChanged);
        tracing::info!("vault initialized");
        Ok(())
    }

    /// Unlock with `passphrase`.
    ///
    /// While locked out this fails immediately without consuming an
    /// attempt.  A wrong passphrase consumes one; the fifth consecutive
    /// failure opens a five-minute lockout window.
    pub fn unlock(&mut self, passphrase: &str) -> Result<()> {
        let now = self.clock.now_ms();
        self.lockout.check(now)?;

        self.end_session();

        let header = VaultHeader::read(&self.store.load()?)?.ok_or(VaultError::VaultNotInitialized)?;

        match verify_passphrase(passphrase, &header, now) {
            Ok(keys) => {
                self.lockout.reset();
                self.start_session(keys, now);
                tracing::info!("vault unlocked");
                Ok(())
            }
            Err(e) => {
                let remaining_attempts = self.lockout.record_failure(now);
                tracing::warn!(
                    failed_attempts = self.lockout.failed_attempts(),
                    remaining_attempts,
                    "vault unlock failed"
                );
                if let Some(until) = self.lockout.locked_until_ms().filter(|_| remaining_attempts == 0) {
                    tracing::warn!(locked_until_ms = until, "too many failed attempts, unlock suspended");
                }
                match e {
                    VaultError::WeakPassphrase { .. } => Err(e),
                    _ => Err(VaultError::InvalidPassphrase { remaining_attempts }),
                }
            }
        }
    }

    /// Drop the keys.  Idempotent.
    pub fn lock(&mut self) {
        if self.end_session() {
            tracing::info!("vault locked");
        }
    }

    /// Lock the vault if its inactivity deadline has passed.  Returns
    /// `true` when this call locked it.
    pub fn poll_auto_lock(&mut self) -> bool {
        let now = self.clock.now_ms();
        match &self.session {
            Some(session) if session.is_expired(now) => {
                self.auto_lock_now();
                true
            }
            _ => false,
        }
    }

    /// Re-key the vault from `old_passphrase` to `new_passphrase`.
    ///
    /// Runs as a staged pipeline: verify, decrypt every record, derive new
    /// keys, encrypt every record, swap the document.  The document is
    /// written exactly once, at the end; any earlier failure leaves it as it
    /// was.  Any failure also drops the session.
    pub fn change_password(&mut self, old_passphrase: &str, new_passphrase: &str) -> Result<()> {
        let result = self.rekey(old_passphrase, new_passphrase);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "password change aborted, vault unchanged");
            self.end_session();
        }
        result
    }

    /// Rewrite a legacy document in the current format under the same
    /// passphrase.
    pub fn migrate(&mut self, passphrase: &str) -> Result<()> {
        self.change_password(passphrase, passphrase)
    }

    fn rekey(&mut self, old_passphrase: &str, new_passphrase: &str) -> Result<()> {
        check_passphrase(new_passphrase)?;

        // 1. Verify the old passphrase (counts as an unlock attempt).
        self.unlock(old_passphrase)?;

        let now = self.clock.now_ms();
        let fields = self.store.load()?;
        let header = self.header_of(&fields)?;
        let session = self.session.as_ref().ok_or(VaultError::VaultLocked)?;

        // 2. Decrypt everything under the current keys.
        let plain = {
            let cx = Crypt {
                keys: session.keys(),
                rng: &mut *self.rng,
                now_ms: now,
                version: header.version,
            };
            records::decrypt_all(&fields, &cx)?
        };

        // 3. Fresh salt and key pair.
        let salt = generate_salt(&mut *self.rng, now)?;
        let keys = derive_keys(new_passphrase, &salt, &self.kdf)?;

        // 4. Re-encrypt into a brand-new document.
        let mut next = records::foreign_fields(&fields);
        let new_header = VaultHeader {
            salt,
            verification: encrypt(&keys, &mut *self.rng, now, VERIFICATION_TEXT)?,
            version: FormatVersion::Current,
            kdf: self.kdf,
        };
        new_header.write_into(&mut next);
        {
            let mut cx = Crypt {
                keys: &keys,
                rng: &mut *self.rng,
                now_ms: now,
                version: FormatVersion::Current,
            };
            records::encrypt_all(&plain, &mut cx, &mut next)?;
        }

        // 5. Swap.
        self.store.replace(next)?;

        self.end_session();
        self.start_session(keys, now);
        self.listener.notify(VaultEvent::RecordsChanged);
        tracing::info!(records = plain.len(), "vault password changed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Add a new secret.  Empty or `None` optional fields are not stored.
    pub fn add_secret(
        &mut self,
        name: &str,
        value: &str,
        username: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.mutate(|fields, cx| records::add(fields, cx, name, value, username, description))
    }

    /// Replace the value of an existing secret.
    ///
    /// `None` for `username`/`description` leaves that field unchanged,
    /// `Some("")` clears it.
    pub fn update_secret(
        &mut self,
        name: &str,
        value: &str,
        username: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        self.mutate(|fields, cx| records::update(fields, cx, name, value, username, description))
    }

    /// Remove a secret and every field that belongs to it.
    pub fn delete_secret(&mut self, name: &str) -> Result<()> {
        self.mutate(|fields, cx| records::delete(fields, name, cx.version))
    }

    pub fn get_secret(&mut self, name: &str) -> Result<String> {
        self.read(|fields, cx| records::get_value(fields, cx, name))
    }

    pub fn get_username(&mut self, name: &str) -> Result<Option<String>> {
        self.read(|fields, cx| records::get_optional(fields, cx, name, OptionalField::Username))
    }

    pub fn get_description(&mut self, name: &str) -> Result<Option<String>> {
        self.read(|fields, cx| {
            records::get_optional(fields, cx, name, OptionalField::Description)
        })
    }

    /// Metadata-only presence check.
    pub fn has_secret(&mut self, name: &str) -> Result<bool> {
        let (fields, version) = self.load_for_listing()?;
        Ok(records::locate(&fields, name, version).is_some())
    }

    /// Logical names of every stored secret, sorted and deduplicated.
    ///
    /// Names are not secret, so this works while locked.
    pub fn list_secrets(&mut self) -> Result<Vec<String>> {
        Ok(self
            .list_entries()?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Names with creation and modification times.
    pub fn list_entries(&mut self) -> Result<Vec<SecretEntry>> {
        let (fields, version) = self.load_for_listing()?;
        Ok(records::list(&fields, version))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn start_session(&mut self, keys: DerivedKeys, now: i64) {
        self.session = Some(VaultSession::new(keys, self.auto_lock, now));
        self.listener.notify(VaultEvent::Unlocked);
    }

    /// Drop the session (zeroing its keys).  Returns `true` if one existed.
    fn end_session(&mut self) -> bool {
        if self.session.take().is_some() {
            self.listener.notify(VaultEvent::Locked);
            true
        } else {
            false
        }
    }

    fn auto_lock_now(&mut self) {
        self.listener.notify(VaultEvent::AutoLocked);
        self.end_session();
        tracing::info!("vault auto-locked after inactivity");
    }

    /// Check the session is live and push its deadline out.
    fn touch(&mut self) -> Result<i64> {
        let now = self.clock.now_ms();
        let expired = match &self.session {
            None => return Err(VaultError::VaultLocked),
            Some(session) => session.is_expired(now),
        };
        if expired {
            self.auto_lock_now();
            return Err(VaultError::VaultLocked);
        }
        if let Some(session) = self.session.as_mut() {
            session.touch(now);
        }
        Ok(now)
    }

    fn load_for_listing(&mut self) -> Result<(Fields, FormatVersion)> {
        if self.is_unlocked() {
            // Activity while unlocked keeps the session alive; an expired
            // session is locked but listing still proceeds.
            let _ = self.touch();
        }
        let fields = self.store.load()?;
        let version = VaultHeader::read(&fields)?
            .map_or(FormatVersion::Current, |header| header.version);
        Ok((fields, version))
    }

    /// Run a read-only record operation under the live session.
    fn read<T>(&mut self, op: impl FnOnce(&Fields, &Crypt<'_>) -> Result<T>) -> Result<T> {
        let now = self.touch()?;
        let fields = self.store.load()?;
        let header = self.header_of(&fields)?;
        let session = self.session.as_ref().ok_or(VaultError::VaultLocked)?;

        let cx = Crypt {
            keys: session.keys(),
            rng: &mut *self.rng,
            now_ms: now,
            version: header.version,
        };
        let result = op(&fields, &cx);
        self.fail_closed(result)
    }

    /// Run a mutating record operation and write the document back once.
    fn mutate(&mut self, op: impl FnOnce(&mut Fields, &mut Crypt<'_>) -> Result<()>) -> Result<()> {
        let now = self.touch()?;
        let mut fields = self.store.load()?;
        let header = self.header_of(&fields)?;
        let session = self.session.as_ref().ok_or(VaultError::VaultLocked)?;

        let mut cx = Crypt {
            keys: session.keys(),
            rng: &mut *self.rng,
            now_ms: now,
            version: header.version,
        };
        let result = op(&mut fields, &mut cx);
        self.fail_closed(result)?;

        self.store.replace(fields)?;
        self.listener.notify(VaultEvent::RecordsChanged);
        Ok(())
    }

    /// The header of a loaded document.  A corrupt header ends the session.
    fn header_of(&mut self, fields: &Fields) -> Result<VaultHeader> {
        let header = VaultHeader::read(fields).and_then(|h| h.ok_or(VaultError::VaultNotInitialized));
        self.fail_closed(header)
    }

    /// Cryptographic failures end the session before being returned.
    fn fail_closed<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_crypto_failure() {
                tracing::warn!(error = %e, "cryptographic failure, locking vault");
                self.end_session();
            }
        }
        result
    }
}

/// Derive keys from `passphrase` and check them against the stored
/// verification record in constant time.
fn verify_passphrase(passphrase: &str, header: &VaultHeader, now: i64) -> Result<DerivedKeys> {
    let keys = derive_keys(passphrase, &header.salt, &header.kdf)?;
    let text = decrypt(&keys, &header.verification, now)?;
    if bool::from(text.as_bytes().ct_eq(VERIFICATION_TEXT.as_bytes())) {
        Ok(keys)
    } else {
        Err(VaultError::InvalidPassphrase {
            remaining_attempts: 0,
        })
    }
}
