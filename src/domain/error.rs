//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::booking::BookingStatus;

/// Booking and catalog errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Ticket count below one
    #[error("Ticket count must be at least 1 (got {0})")]
    InvalidTicketCount(i64),

    /// Ticket count beyond what any event can hold
    #[error("Ticket count {0} is too large")]
    TicketCountTooLarge(i64),

    /// Event data failed validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Price failed validation
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Empty or malformed user id
    #[error("Invalid user id")]
    InvalidUserId,

    /// Capacity is fixed once the event exists
    #[error("Event capacity cannot be changed after creation")]
    CapacityImmutable,

    /// Reservation would overcommit the event
    #[error("Insufficient capacity: requested {requested}, remaining {remaining}")]
    InsufficientCapacity { requested: u32, remaining: u32 },

    /// Event not found
    #[error("Event not found: {0}")]
    EventNotFound(Uuid),

    /// Booking not found
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    /// Requester does not own the booking
    #[error("Booking {0} belongs to another user")]
    NotBookingOwner(Uuid),

    /// Booking was already cancelled
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    /// Status transition not allowed by the booking lifecycle
    #[error("Invalid booking transition: {from} -> {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    /// Same idempotency key reused for a different request
    #[error("Idempotency key {0} was already used for a different booking request")]
    IdempotencyConflict(Uuid),
}

impl DomainError {
    /// Create an insufficient capacity error
    pub fn insufficient_capacity(requested: u32, remaining: u32) -> Self {
        Self::InsufficientCapacity {
            requested,
            remaining,
        }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTicketCount(_)
                | Self::TicketCountTooLarge(_)
                | Self::InvalidEvent(_)
                | Self::InvalidPrice(_)
                | Self::InvalidUserId
                | Self::CapacityImmutable
                | Self::NotBookingOwner(_)
        )
    }

    /// Check if this is a conflict error (state changed under the caller)
    pub fn is_conflict_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCapacity { .. }
                | Self::AlreadyCancelled(_)
                | Self::IdempotencyConflict(_)
        )
    }
}
