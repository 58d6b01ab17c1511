//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Booking, Event};

// =========================================================================
// CreateBookingCommand
// =========================================================================

/// Command to book tickets for an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingCommand {
    pub event_id: Uuid,
    /// Signed so that zero and negative counts reach validation
    pub ticket_count: i64,
}

impl CreateBookingCommand {
    pub fn new(event_id: Uuid, ticket_count: i64) -> Self {
        Self {
            event_id,
            ticket_count,
        }
    }
}

/// Result of a booking command
#[derive(Debug, Clone)]
pub struct BookingResult {
    pub booking: Booking,
    /// True when an earlier booking with the same idempotency key was returned
    pub replayed: bool,
}

// =========================================================================
// Read models
// =========================================================================

/// A booking with its event, when the event still exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

/// Seat availability of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub available: bool,
    pub remaining_seats: u32,
}

impl Availability {
    pub fn from_remaining(remaining_seats: u32) -> Self {
        Self {
            available: remaining_seats > 0,
            remaining_seats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_command_from_json() {
        let event_id = Uuid::new_v4();
        let json = format!(r#"{{"eventId":"{event_id}","ticketCount":3}}"#);
        let cmd: CreateBookingCommand = serde_json::from_str(&json).unwrap();

        assert_eq!(cmd.event_id, event_id);
        assert_eq!(cmd.ticket_count, 3);
    }

    #[test]
    fn test_availability_json() {
        let json = serde_json::to_value(Availability::from_remaining(0)).unwrap();
        assert_eq!(json, serde_json::json!({ "available": false, "remainingSeats": 0 }));

        assert!(Availability::from_remaining(5).available);
    }
}
