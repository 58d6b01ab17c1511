//! Ledger Entry
//!
//! Seat accounting for a single event. Pure state, no locking; callers
//! hold whatever lock serializes access to the entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;

/// Seats consumed for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    event_id: Uuid,
    capacity: u32,
    booked_seats: u32,
}

/// A successful seat reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub event_id: Uuid,
    pub seats: u32,
    pub booked_seats_after: u32,
}

/// Outcome of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    /// Seats actually returned to the pool
    pub released: u32,
    /// Seats requested beyond what was booked (ignored)
    pub excess: u32,
}

/// Point-in-time view of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub capacity: u32,
    pub booked_seats: u32,
}

impl LedgerSnapshot {
    /// `capacity - booked_seats`, floored at zero
    pub fn remaining_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.booked_seats)
    }
}

impl LedgerEntry {
    /// Open an empty entry for a new event
    pub fn open(event_id: Uuid, capacity: u32) -> Self {
        Self {
            event_id,
            capacity,
            booked_seats: 0,
        }
    }

    /// Rebuild an entry from stored state
    pub fn from_parts(event_id: Uuid, capacity: u32, booked_seats: u32) -> Self {
        Self {
            event_id,
            capacity,
            booked_seats: booked_seats.min(capacity),
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn booked_seats(&self) -> u32 {
        self.booked_seats
    }

    pub fn remaining_seats(&self) -> u32 {
        self.snapshot().remaining_seats()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            capacity: self.capacity,
            booked_seats: self.booked_seats,
        }
    }

    /// Check and increment in one step.
    ///
    /// # Errors
    /// - `InvalidTicketCount` for zero seats
    /// - `InsufficientCapacity` if `booked_seats + seats > capacity`
    pub fn try_reserve(&mut self, seats: u32) -> Result<Reservation, DomainError> {
        if seats == 0 {
            return Err(DomainError::InvalidTicketCount(0));
        }

        let remaining = self.remaining_seats();
        if seats > remaining {
            return Err(DomainError::insufficient_capacity(seats, remaining));
        }

        self.booked_seats += seats;

        Ok(Reservation {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            seats,
            booked_seats_after: self.booked_seats,
        })
    }

    /// Decrement, clamped at zero. Never fails.
    pub fn release(&mut self, seats: u32) -> Release {
        let released = seats.min(self.booked_seats);
        self.booked_seats -= released;

        Release {
            released,
            excess: seats - released,
        }
    }
}
