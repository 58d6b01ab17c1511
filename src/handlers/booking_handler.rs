//! Booking Manager
//!
//! Creates and cancels bookings. Seat reservation and the booking record
//! are written by the datastore as one atomic unit; this layer validates
//! input, checks ownership and logs outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{Booking, DomainError, Event, OperationContext, Pricing, UserId};
use crate::error::AppError;
use crate::store::{BookingOutcome, BookingRequest, Datastore};

use super::{BookingResult, BookingView, CreateBookingCommand};

/// Booking service over a datastore
#[derive(Clone)]
pub struct BookingManager {
    store: Arc<dyn Datastore>,
    pricing: Pricing,
}

impl BookingManager {
    pub fn new(store: Arc<dyn Datastore>, pricing: Pricing) -> Self {
        Self { store, pricing }
    }

    /// Book `ticket_count` seats for `user_id`
    ///
    /// With an idempotency key, a repeated request returns the original
    /// booking without reserving again.
    pub async fn create_booking(
        &self,
        user_id: &UserId,
        command: CreateBookingCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> Result<BookingResult, AppError> {
        if command.ticket_count < 1 {
            return Err(DomainError::InvalidTicketCount(command.ticket_count).into());
        }
        let ticket_count = u32::try_from(command.ticket_count)
            .map_err(|_| DomainError::TicketCountTooLarge(command.ticket_count))?;

        let request = BookingRequest {
            user_id: user_id.clone(),
            event_id: command.event_id,
            ticket_count,
            idempotency_key,
            pricing: self.pricing,
        };

        let outcome = match self.store.reserve_and_record(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::info!(
                    user_id = %user_id,
                    event_id = %command.event_id,
                    ticket_count = ticket_count,
                    correlation_id = %context.correlation_id,
                    error = %e,
                    "Booking rejected"
                );
                return Err(e.into());
            }
        };

        match &outcome {
            BookingOutcome::Created { booking, reservation } => {
                tracing::info!(
                    booking_id = %booking.id,
                    user_id = %user_id,
                    event_id = %booking.event_id,
                    ticket_count = booking.ticket_count,
                    booked_seats = reservation.booked_seats_after,
                    total_price = %booking.total_price,
                    correlation_id = %context.correlation_id,
                    "Booking confirmed"
                );
            }
            BookingOutcome::Replayed(booking) => {
                tracing::info!(
                    booking_id = %booking.id,
                    user_id = %user_id,
                    correlation_id = %context.correlation_id,
                    "Booking replayed"
                );
            }
        }

        let replayed = outcome.is_replay();
        Ok(BookingResult {
            booking: outcome.into_booking(),
            replayed,
        })
    }

    /// Cancel a booking owned by `requester` and release its seats
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        requester: &UserId,
        context: &OperationContext,
    ) -> Result<Booking, AppError> {
        let outcome = self.store.cancel_and_release(booking_id, requester).await?;

        tracing::info!(
            booking_id = %booking_id,
            user_id = %requester,
            event_id = %outcome.booking.event_id,
            released = outcome.release.released,
            correlation_id = %context.correlation_id,
            "Booking cancelled"
        );
        Ok(outcome.booking)
    }

    /// A single booking, visible only to its owner
    pub async fn get_booking(&self, booking_id: Uuid, requester: &UserId) -> Result<Booking, AppError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(AppError::BookingNotFound)?;
        booking.ensure_owner(requester)?;
        Ok(booking)
    }

    /// All bookings of a user, newest first, with their events.
    /// Bookings of deleted events come without `event`.
    pub async fn list_bookings_for_user(&self, user_id: &UserId) -> Result<Vec<BookingView>, AppError> {
        let bookings = self.store.bookings_for_user(user_id).await?;

        let mut events: HashMap<Uuid, Option<Event>> = HashMap::new();
        let mut views = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let event = match events.get(&booking.event_id) {
                Some(event) => event.clone(),
                None => {
                    let event = self.store.get_event(booking.event_id).await?;
                    events.insert(booking.event_id, event.clone());
                    event
                }
            };
            views.push(BookingView { booking, event });
        }

        Ok(views)
    }
}
