//! Datastore module
//!
//! Persistence seam for the catalog, the seat ledger and bookings.
//! Two backends: `MemoryStore` for development and tests, `PgStore` for
//! PostgreSQL. Both make reserve-and-record and cancel-and-release a
//! single atomic unit.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    Booking, DomainError, Event, EventChanges, EventFilter, Pricing, UserId,
};
use crate::ledger::{LedgerSnapshot, Release, Reservation};

/// Datastore errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data violates a domain invariant
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Everything the store needs to reserve seats and record a booking
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: UserId,
    pub event_id: Uuid,
    pub ticket_count: u32,
    pub idempotency_key: Option<Uuid>,
    pub pricing: Pricing,
}

/// Outcome of `reserve_and_record`
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    /// Seats reserved and a new booking recorded
    Created {
        booking: Booking,
        reservation: Reservation,
    },
    /// Same idempotency key seen before; nothing changed
    Replayed(Booking),
}

impl BookingOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingOutcome::Created { booking, .. } => booking,
            BookingOutcome::Replayed(booking) => booking,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            BookingOutcome::Created { booking, .. } => booking,
            BookingOutcome::Replayed(booking) => booking,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, BookingOutcome::Replayed(_))
    }
}

/// Outcome of `cancel_and_release`
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub release: Release,
}

/// Ledger entry whose count disagrees with its confirmed bookings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiscrepancy {
    pub event_id: Uuid,
    pub booked_seats: u32,
    pub confirmed_seats: u32,
}

/// Storage operations used by the catalog, booking and availability services
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Persist a new event and open its ledger entry in the same step
    async fn insert_event(&self, event: Event) -> Result<Event, StoreError>;

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Events matching `filter`, ordered by date then title
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;

    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> Result<Event, StoreError>;

    /// Remove an event and its ledger entry. Bookings are kept.
    async fn delete_event(&self, event_id: Uuid) -> Result<bool, StoreError>;

    /// Distinct non-empty categories, sorted
    async fn categories(&self) -> Result<Vec<String>, StoreError>;

    async fn ledger_snapshot(&self, event_id: Uuid) -> Result<Option<LedgerSnapshot>, StoreError>;

    /// Reserve seats and record a confirmed booking as one atomic unit
    async fn reserve_and_record(&self, request: BookingRequest) -> Result<BookingOutcome, StoreError>;

    /// Cancel a booking and release its seats as one atomic unit
    async fn cancel_and_release(
        &self,
        booking_id: Uuid,
        requester: &UserId,
    ) -> Result<CancelOutcome, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// All bookings of a user, newest first
    async fn bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>, StoreError>;

    /// Ledger entries whose booked seats differ from their confirmed tickets
    async fn find_ledger_discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, StoreError>;
}

/// Resolve a request whose idempotency key already has a booking
pub(crate) fn replay_or_conflict(
    existing: Booking,
    request: &BookingRequest,
    key: Uuid,
) -> Result<BookingOutcome, StoreError> {
    if existing.matches_request(request.event_id, request.ticket_count) {
        tracing::info!(
            booking_id = %existing.id,
            idempotency_key = %key,
            "Replaying booking for repeated idempotency key"
        );
        Ok(BookingOutcome::Replayed(existing))
    } else {
        Err(DomainError::IdempotencyConflict(key).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn request(event_id: Uuid, ticket_count: u32, key: Uuid) -> BookingRequest {
        BookingRequest {
            user_id: UserId::new("usr_1").unwrap(),
            event_id,
            ticket_count,
            idempotency_key: Some(key),
            pricing: Pricing::default(),
        }
    }

    #[test]
    fn test_replay_when_request_matches() {
        let event_id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let existing = Booking::pending(
            UserId::new("usr_1").unwrap(),
            event_id,
            2,
            dec!(10),
            Some(key),
            Utc::now(),
        )
        .unwrap();

        let outcome = replay_or_conflict(existing.clone(), &request(event_id, 2, key), key).unwrap();
        assert!(outcome.is_replay());
        assert_eq!(outcome.into_booking(), existing);
    }

    #[test]
    fn test_conflict_when_request_differs() {
        let event_id = Uuid::new_v4();
        let key = Uuid::new_v4();
        let existing = Booking::pending(
            UserId::new("usr_1").unwrap(),
            event_id,
            2,
            dec!(10),
            Some(key),
            Utc::now(),
        )
        .unwrap();

        let result = replay_or_conflict(existing, &request(event_id, 3, key), key);
        assert!(matches!(
            result,
            Err(StoreError::Domain(DomainError::IdempotencyConflict(k))) if k == key
        ));
    }
}
