//! Booking lifecycle
//!
//! A booking is a user's claim on seats for one event. It is never deleted;
//! cancellation is a status transition.
//!
//! ```text
//! pending --confirm--> confirmed --cancel--> cancelled
//!    \______________________cancel________________/
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{DomainError, UserId};

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether seats are held in the ledger for this status
    pub fn holds_seats(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Booking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: UserId,
    pub event_id: Uuid,
    pub ticket_count: u32,
    pub status: BookingStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    pub booking_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub idempotency_key: Option<Uuid>,
}

/// Result of a successful cancellation
#[derive(Debug, Clone, PartialEq)]
pub struct Cancellation {
    pub booking: Booking,
    /// Seats to hand back to the ledger (zero for a pending booking)
    pub seats_to_release: u32,
}

impl Booking {
    /// Start a new booking in `pending`.
    pub fn pending(
        user_id: UserId,
        event_id: Uuid,
        ticket_count: u32,
        total_price: Decimal,
        idempotency_key: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if ticket_count == 0 {
            return Err(DomainError::InvalidTicketCount(0));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            ticket_count,
            status: BookingStatus::Pending,
            total_price,
            booking_date: now,
            cancelled_at: None,
            idempotency_key,
        })
    }

    /// `pending -> confirmed`, once the seats are reserved.
    pub fn confirm(mut self) -> Result<Self, DomainError> {
        if self.status != BookingStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Confirmed,
            });
        }
        self.status = BookingStatus::Confirmed;
        Ok(self)
    }

    /// Cancel on behalf of `requester`.
    ///
    /// # Errors
    /// - `NotBookingOwner` if the requester is someone else
    /// - `AlreadyCancelled` on a second cancellation
    pub fn cancel(mut self, requester: &UserId, now: DateTime<Utc>) -> Result<Cancellation, DomainError> {
        self.ensure_owner(requester)?;

        let seats_to_release = match self.status {
            BookingStatus::Cancelled => return Err(DomainError::AlreadyCancelled(self.id)),
            BookingStatus::Confirmed => self.ticket_count,
            BookingStatus::Pending => 0,
        };

        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);

        Ok(Cancellation {
            booking: self,
            seats_to_release,
        })
    }

    pub fn ensure_owner(&self, requester: &UserId) -> Result<(), DomainError> {
        if &self.user_id != requester {
            return Err(DomainError::NotBookingOwner(self.id));
        }
        Ok(())
    }

    /// Whether a replayed request carries the same booking intent.
    pub fn matches_request(&self, event_id: Uuid, ticket_count: u32) -> bool {
        self.event_id == event_id && self.ticket_count == ticket_count
    }
}
