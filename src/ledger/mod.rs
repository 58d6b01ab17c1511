//! Seat Ledger
//!
//! Authoritative count of consumed capacity per event.
//! Each event's entry sits behind its own mutex, so reservations for the
//! same event are linearized while different events never contend.

mod entry;

pub use entry::{LedgerEntry, LedgerSnapshot, Release, Reservation};

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::DomainError;

/// Shared handle to one event's entry
pub type EntryHandle = Arc<Mutex<LedgerEntry>>;

/// In-memory seat ledger
#[derive(Debug, Default)]
pub struct SeatLedger {
    entries: RwLock<HashMap<Uuid, EntryHandle>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an entry for a newly created event. Re-opening keeps the existing entry.
    pub fn open(&self, event_id: Uuid, capacity: u32) {
        self.entries
            .write()
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(LedgerEntry::open(event_id, capacity))));
    }

    /// Drop the entry of a deleted event
    pub fn close(&self, event_id: Uuid) -> bool {
        self.entries.write().remove(&event_id).is_some()
    }

    /// Handle to an entry, for callers that must hold the lock across
    /// a reserve and a write elsewhere.
    pub fn entry(&self, event_id: Uuid) -> Option<EntryHandle> {
        self.entries.read().get(&event_id).cloned()
    }

    /// Reserve seats atomically.
    pub fn reserve(&self, event_id: Uuid, seats: u32) -> Result<Reservation, DomainError> {
        let entry = self
            .entry(event_id)
            .ok_or(DomainError::EventNotFound(event_id))?;
        let mut entry = entry.lock();
        entry.try_reserve(seats)
    }

    /// Release seats, clamped at zero. Excess and unknown events are logged and ignored.
    pub fn release(&self, event_id: Uuid, seats: u32) -> Release {
        match self.entry(event_id) {
            Some(entry) => {
                let mut entry = entry.lock();
                let release = entry.release(seats);
                log_release(event_id, seats, &release);
                release
            }
            None => {
                tracing::warn!(
                    event_id = %event_id,
                    seats = seats,
                    "Release for event without ledger entry ignored"
                );
                Release {
                    released: 0,
                    excess: seats,
                }
            }
        }
    }

    /// Consistent read of one entry
    pub fn snapshot(&self, event_id: Uuid) -> Option<LedgerSnapshot> {
        self.entry(event_id).map(|entry| entry.lock().snapshot())
    }

    /// Ids of all open entries
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.entries.read().keys().copied().collect()
    }
}

/// Shared logging for releases so both backends report excess the same way
pub(crate) fn log_release(event_id: Uuid, requested: u32, release: &Release) {
    if release.excess > 0 {
        tracing::warn!(
            event_id = %event_id,
            requested = requested,
            released = release.released,
            excess = release.excess,
            "Excess seat release ignored"
        );
    } else {
        tracing::debug!(event_id = %event_id, released = release.released, "Seats released");
    }
}
