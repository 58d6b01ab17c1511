//! In-memory datastore
//!
//! Used when no DATABASE_URL is configured, and by the test suite.
//! Critical sections are synchronous (no `.await` while a lock is held),
//! so a dropped request can never leave a reservation without its booking.
//!
//! Lock order: ledger entry -> idempotency map -> bookings. The idempotency
//! map is held only to look up or claim a key, never while waiting on an entry.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, DomainError, Event, EventChanges, EventFilter, UserId};
use crate::ledger::{log_release, LedgerSnapshot, Release, SeatLedger};

use super::{
    replay_or_conflict, BookingOutcome, BookingRequest, CancelOutcome, Datastore,
    LedgerDiscrepancy, StoreError,
};

/// In-memory implementation of [`Datastore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<HashMap<Uuid, Event>>,
    ledger: SeatLedger,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    idempotency: Mutex<HashMap<(UserId, Uuid), Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Booking already recorded under `(user_id, key)`
    fn booking_for_key(&self, user_id: &UserId, key: Uuid) -> Result<Option<Booking>, StoreError> {
        let Some(booking_id) = self.idempotency.lock().get(&(user_id.clone(), key)).copied() else {
            return Ok(None);
        };
        self.bookings
            .read()
            .get(&booking_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("idempotency key {key} points to missing booking")))
    }

    fn record_booking(&self, request: &BookingRequest) -> Result<BookingOutcome, StoreError> {
        if let Some(key) = request.idempotency_key {
            if let Some(existing) = self.booking_for_key(&request.user_id, key)? {
                return replay_or_conflict(existing, request, key);
            }
        }

        let price = self
            .events
            .read()
            .get(&request.event_id)
            .map(|event| event.price)
            .ok_or(DomainError::EventNotFound(request.event_id))?;

        let entry = self
            .ledger
            .entry(request.event_id)
            .ok_or(DomainError::EventNotFound(request.event_id))?;
        let mut entry = entry.lock();

        let booking = Booking::pending(
            request.user_id.clone(),
            request.event_id,
            request.ticket_count,
            request.pricing.total_for(price, request.ticket_count),
            request.idempotency_key,
            Utc::now(),
        )?
        .confirm()?;

        let reservation = entry.try_reserve(request.ticket_count)?;

        // Claim the key only now. A request that lost the claim gives its seats
        // back before the entry lock is released.
        let mut keys = request.idempotency_key.map(|_| self.idempotency.lock());
        if let (Some(keys), Some(key)) = (keys.as_mut(), request.idempotency_key) {
            match keys.entry((request.user_id.clone(), key)) {
                Entry::Occupied(claimed) => {
                    entry.release(request.ticket_count);
                    let existing = self.bookings.read().get(claimed.get()).cloned().ok_or_else(|| {
                        StoreError::Corrupt(format!("idempotency key {key} points to missing booking"))
                    })?;
                    return replay_or_conflict(existing, request, key);
                }
                Entry::Vacant(slot) => {
                    slot.insert(booking.id);
                }
            }
        }

        // Recorded before the key lock drops, so a claimed key always resolves
        self.bookings.write().insert(booking.id, booking.clone());
        drop(keys);

        Ok(BookingOutcome::Created {
            booking,
            reservation,
        })
    }

    fn cancel_booking(&self, booking_id: Uuid, requester: &UserId) -> Result<CancelOutcome, StoreError> {
        // Find the event first so the ledger lock is taken before the bookings lock
        let event_id = self
            .bookings
            .read()
            .get(&booking_id)
            .map(|booking| booking.event_id)
            .ok_or(DomainError::BookingNotFound(booking_id))?;

        let entry = self.ledger.entry(event_id);
        let mut entry = entry.as_ref().map(|entry| entry.lock());
        let mut bookings = self.bookings.write();

        let booking = bookings
            .get(&booking_id)
            .cloned()
            .ok_or(DomainError::BookingNotFound(booking_id))?;
        let cancellation = booking.cancel(requester, Utc::now())?;

        let seats = cancellation.seats_to_release;
        let release = match entry.as_mut() {
            _ if seats == 0 => Release {
                released: 0,
                excess: 0,
            },
            Some(entry) => {
                let release = entry.release(seats);
                log_release(event_id, seats, &release);
                release
            }
            None => {
                tracing::warn!(
                    event_id = %event_id,
                    booking_id = %booking_id,
                    seats = seats,
                    "Cancelled booking for deleted event; no ledger entry to release"
                );
                Release {
                    released: 0,
                    excess: seats,
                }
            }
        };

        bookings.insert(booking_id, cancellation.booking.clone());

        Ok(CancelOutcome {
            booking: cancellation.booking,
            release,
        })
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn insert_event(&self, event: Event) -> Result<Event, StoreError> {
        let mut events = self.events.write();
        if events.contains_key(&event.id) {
            return Err(StoreError::Corrupt(format!("duplicate event id {}", event.id)));
        }
        self.ledger.open(event.id, event.capacity);
        events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().get(&event_id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
        Ok(events)
    }

    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> Result<Event, StoreError> {
        let mut events = self.events.write();
        let current = events
            .get(&event_id)
            .cloned()
            .ok_or(DomainError::EventNotFound(event_id))?;
        let updated = current.apply_changes(changes, Utc::now())?;
        events.insert(event_id, updated.clone());
        Ok(updated)
    }

    async fn delete_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let removed = self.events.write().remove(&event_id).is_some();
        if removed {
            self.ledger.close(event_id);
        }
        Ok(removed)
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let categories: BTreeSet<String> = self
            .events
            .read()
            .values()
            .filter(|event| !event.category.is_empty())
            .map(|event| event.category.clone())
            .collect();
        Ok(categories.into_iter().collect())
    }

    async fn ledger_snapshot(&self, event_id: Uuid) -> Result<Option<LedgerSnapshot>, StoreError> {
        Ok(self.ledger.snapshot(event_id))
    }

    async fn reserve_and_record(&self, request: BookingRequest) -> Result<BookingOutcome, StoreError> {
        self.record_booking(&request)
    }

    async fn cancel_and_release(
        &self,
        booking_id: Uuid,
        requester: &UserId,
    ) -> Result<CancelOutcome, StoreError> {
        self.cancel_booking(booking_id, requester)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().get(&booking_id).cloned())
    }

    async fn bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|booking| &booking.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(bookings)
    }

    async fn find_ledger_discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, StoreError> {
        let mut discrepancies = Vec::new();

        for event_id in self.ledger.event_ids() {
            let Some(entry) = self.ledger.entry(event_id) else {
                continue;
            };
            // Holding the entry lock keeps bookings for this event stable
            let entry = entry.lock();
            let confirmed_seats: u32 = self
                .bookings
                .read()
                .values()
                .filter(|b| b.event_id == event_id && b.status == BookingStatus::Confirmed)
                .map(|b| b.ticket_count)
                .sum();

            if entry.booked_seats() != confirmed_seats {
                discrepancies.push(LedgerDiscrepancy {
                    event_id,
                    booked_seats: entry.booked_seats(),
                    confirmed_seats,
                });
            }
        }

        Ok(discrepancies)
    }
}
