//! Deterministic collaborators shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use docvault::config::Settings;
use docvault::crypto::{OsRandom, RandomSource};
use docvault::errors::{Result, VaultError};
use docvault::vault::{Clock, EventLog, MemoryStore, Vault};

pub const T0: i64 = 1_700_000_000_000;

/// A clock that only moves when told to.  Clones share the reading.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// OS randomness that can be told to fail after a number of draws.
#[derive(Debug, Clone)]
pub struct FlakyRng {
    budget: Arc<AtomicUsize>,
}

impl FlakyRng {
    pub fn new() -> Self {
        Self {
            budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Allow `draws` more successful fills, then fail every one after.
    pub fn fail_after(&self, draws: usize) {
        self.budget.store(draws, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.budget.store(usize::MAX, Ordering::SeqCst);
    }
}

impl RandomSource for FlakyRng {
    fn fill(&mut self, dest: &mut [u8]) -> Result<()> {
        let left = self.budget.load(Ordering::SeqCst);
        if left == 0 {
            return Err(VaultError::RandomUnavailable("injected failure".into()));
        }
        if left != usize::MAX {
            self.budget.store(left - 1, Ordering::SeqCst);
        }
        OsRandom.fill(dest)
    }
}

/// A vault over an in-memory document with controllable time, randomness
/// and an event log.
pub struct Harness {
    pub vault: Vault<MemoryStore>,
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub rng: FlakyRng,
    pub events: EventLog,
}

pub fn harness() -> Harness {
    harness_with(MemoryStore::new(), &Settings::default())
}

pub fn harness_with(store: MemoryStore, settings: &Settings) -> Harness {
    let clock = ManualClock::new(T0);
    let rng = FlakyRng::new();
    let events = EventLog::new();
    let vault = Vault::new(store.clone(), settings)
        .with_clock(clock.clone())
        .with_rng(rng.clone())
        .with_listener(events.clone());
    Harness {
        vault,
        store,
        clock,
        rng,
        events,
    }
}

/// A harness whose vault is initialized with `password` and unlocked.
pub fn unlocked(password: &str) -> Harness {
    let mut h = harness();
    h.vault.set_password(password).unwrap();
    h.events.take();
    h
}
