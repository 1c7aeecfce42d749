//! Session state: the held key pair, the inactivity deadline and the
//! failed-attempt lockout.
//!
//! Time is wall-clock milliseconds supplied by a [`Clock`], so auto-lock
//! and lockout expiry are pure functions of stored timestamps.

use std::time::Duration;

use crate::crypto::kdf::DerivedKeys;
use crate::errors::{Result, VaultError};

/// Consecutive failures allowed before unlocking is suspended.
pub const MAX_ATTEMPTS: u32 = 5;

/// How long unlocking stays suspended once the budget is spent.
pub const LOCKOUT_MS: i64 = 5 * 60 * 1000;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock time source.
pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }
}

// ---------------------------------------------------------------------------
// Lockout
// ---------------------------------------------------------------------------

/// Failed-attempt counter with a time-bounded lockout.
///
/// The same counter drives both enforcement and the "attempts left"
/// figure shown to the user.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Lockout {
    failed_attempts: u32,
    locked_until_ms: Option<i64>,
}

impl Lockout {
    /// Fail with `LockedOut` while the lockout window is open.
    pub fn check(&self, now_ms: i64) -> Result<()> {
        match self.locked_until_ms {
            Some(until) if now_ms < until => {
                let remaining_ms = until - now_ms;
                let remaining_secs = u64::try_from((remaining_ms + 999) / 1000).unwrap_or(0);
                Err(VaultError::LockedOut { remaining_secs })
            }
            _ => Ok(()),
        }
    }

    /// Count one failed attempt, arming the lockout when the budget is
    /// spent.  Returns the attempts left.
    pub fn record_failure(&mut self, now_ms: i64) -> u32 {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= MAX_ATTEMPTS {
            self.locked_until_ms = Some(now_ms + LOCKOUT_MS);
        }
        self.remaining_attempts()
    }

    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.locked_until_ms = None;
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.failed_attempts)
    }

    /// End of the current (or most recent) lockout window.
    pub fn locked_until_ms(&self) -> Option<i64> {
        self.locked_until_ms
    }
}

// ---------------------------------------------------------------------------
// VaultSession
// ---------------------------------------------------------------------------

/// Exists only while the vault is unlocked.  Dropping it zeroes the keys.
#[derive(Debug)]
pub struct VaultSession {
    keys: DerivedKeys,
    idle_timeout_ms: Option<i64>,
    deadline_ms: Option<i64>,
}

impl VaultSession {
    /// Start a session; `idle_timeout` of `None` disables auto-lock.
    pub fn new(keys: DerivedKeys, idle_timeout: Option<Duration>, now_ms: i64) -> Self {
        let idle_timeout_ms =
            idle_timeout.map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        let mut session = Self {
            keys,
            idle_timeout_ms,
            deadline_ms: None,
        };
        session.touch(now_ms);
        session
    }

    pub fn keys(&self) -> &DerivedKeys {
        &self.keys
    }

    /// Push the inactivity deadline out from `now_ms`.
    pub fn touch(&mut self, now_ms: i64) {
        self.deadline_ms = self
            .idle_timeout_ms
            .map(|timeout| now_ms.saturating_add(timeout));
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if now_ms >= deadline)
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn lockout_arms_on_fifth_failure() {
        let mut lockout = Lockout::default();
        for expected_left in [4, 3, 2, 1] {
            assert_eq!(lockout.record_failure(T0), expected_left);
            assert!(lockout.check(T0).is_ok());
        }
        assert_eq!(lockout.record_failure(T0), 0);
        assert_eq!(lockout.locked_until_ms(), Some(T0 + LOCKOUT_MS));

        match lockout.check(T0 + 1_500) {
            Err(VaultError::LockedOut { remaining_secs }) => assert_eq!(remaining_secs, 299),
            other => panic!("expected LockedOut, got {other:?}"),
        }
        assert!(lockout.check(T0 + LOCKOUT_MS).is_ok());
    }

    #[test]
    fn reset_clears_counter_and_window() {
        let mut lockout = Lockout::default();
        for _ in 0..MAX_ATTEMPTS {
            lockout.record_failure(T0);
        }
        lockout.reset();
        assert_eq!(lockout.failed_attempts(), 0);
        assert_eq!(lockout.remaining_attempts(), MAX_ATTEMPTS);
        assert!(lockout.check(T0).is_ok());
    }

    #[test]
    fn session_deadline_moves_with_activity() {
        let keys = DerivedKeys::from_raw([1; 32], [2; 32]);
        let mut session = VaultSession::new(keys, Some(Duration::from_secs(60)), T0);
        assert_eq!(session.deadline_ms(), Some(T0 + 60_000));
        assert!(!session.is_expired(T0 + 59_999));

        session.touch(T0 + 30_000);
        assert!(!session.is_expired(T0 + 60_000));
        assert!(session.is_expired(T0 + 90_000));
    }

    #[test]
    fn session_without_timeout_never_expires() {
        let keys = DerivedKeys::from_raw([1; 32], [2; 32]);
        let session = VaultSession::new(keys, None, T0);
        assert!(!session.is_expired(i64::MAX));
    }
}
