//! Observable vault signals.
//!
//! The host subscribes to two things: whether the vault is unlocked, and
//! whether the record set changed.  Both arrive as [`VaultEvent`]s.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEvent {
    /// Keys are held; the "unlocked" flag is now `yes`.
    Unlocked,
    /// Keys were dropped; the "unlocked" flag is now `no`.
    Locked,
    /// The inactivity timer fired.  Always followed by `Locked`.
    AutoLocked,
    /// The persisted record set was written.
    RecordsChanged,
}

pub trait VaultListener {
    fn notify(&mut self, event: VaultEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl VaultListener for NoopListener {
    fn notify(&mut self, _event: VaultEvent) {}
}

/// Records events in order.  Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<VaultEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<VaultEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl VaultListener for EventLog {
    fn notify(&mut self, event: VaultEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
