//! PostgreSQL datastore
//!
//! Schema lives in `migrations/0001_init.sql`.
//! Reserve-and-record runs in one transaction: the conditional
//! `UPDATE seat_ledger ... WHERE booked_seats + $2 <= capacity` takes the
//! row lock and checks capacity in the same statement, and the booking
//! insert commits with it. Dropping an uncommitted transaction rolls back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, DomainError, Event, EventChanges, EventFilter, Price, UserId};
use crate::ledger::{log_release, LedgerEntry, LedgerSnapshot, Release};

use super::{
    replay_or_conflict, BookingOutcome, BookingRequest, CancelOutcome, Datastore,
    LedgerDiscrepancy, StoreError,
};

const EVENT_COLUMNS: &str = r#"
    id, title, description, event_date, event_time, location, price, capacity,
    image, category, organizer, featured, created_at, updated_at
"#;

const BOOKING_COLUMNS: &str = r#"
    id, user_id, event_id, ticket_count, status, total_price,
    booking_date, cancelled_at, idempotency_key
"#;

/// PostgreSQL implementation of [`Datastore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_by_idempotency_key(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: &UserId,
        key: Uuid,
    ) -> Result<Option<Booking>, StoreError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 AND idempotency_key = $2"
        );
        let row = sqlx::query(&query)
            .bind(user_id.as_str())
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn ledger_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
    ) -> Result<Option<LedgerSnapshot>, StoreError> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT capacity, booked_seats FROM seat_ledger WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|(capacity, booked)| snapshot_from_columns(event_id, capacity, booked))
            .transpose()
    }

    /// Why a reservation of `request.ticket_count` seats cannot go through
    async fn shortfall(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        request: &BookingRequest,
    ) -> Result<StoreError, StoreError> {
        let error = match self.ledger_in_tx(tx, request.event_id).await? {
            Some(snapshot) => {
                DomainError::insufficient_capacity(request.ticket_count, snapshot.remaining_seats())
            }
            None => DomainError::EventNotFound(request.event_id),
        };
        Ok(error.into())
    }

    /// Single attempt at reserve-and-record. A unique violation on the
    /// idempotency index is reported separately so the caller can replay.
    async fn try_reserve_and_record(
        &self,
        request: &BookingRequest,
    ) -> Result<Result<BookingOutcome, IdempotencyRace>, StoreError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = request.idempotency_key {
            if let Some(existing) = self
                .find_by_idempotency_key(&mut tx, &request.user_id, key)
                .await?
            {
                return replay_or_conflict(existing, request, key).map(Ok);
            }
        }

        let price: Option<Decimal> = sqlx::query_scalar("SELECT price FROM events WHERE id = $1")
            .bind(request.event_id)
            .fetch_optional(&mut *tx)
            .await?;
        let price = price.ok_or(DomainError::EventNotFound(request.event_id))?;
        let price = Price::new(price).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let booking = Booking::pending(
            request.user_id.clone(),
            request.event_id,
            request.ticket_count,
            request.pricing.total_for(price, request.ticket_count),
            request.idempotency_key,
            Utc::now(),
        )?
        .confirm()?;

        // Capacity is at most i32::MAX, so a larger count can never fit
        let Ok(seats) = i32::try_from(request.ticket_count) else {
            return Err(self.shortfall(&mut tx, request).await?);
        };

        // Check and increment in one statement under the row lock.
        // `capacity - $2` cannot overflow where `booked_seats + $2` could.
        let booked_after: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE seat_ledger
            SET booked_seats = booked_seats + $2, updated_at = NOW()
            WHERE event_id = $1 AND booked_seats <= capacity - $2
            RETURNING booked_seats
            "#,
        )
        .bind(request.event_id)
        .bind(seats)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(booked_after) = booked_after else {
            return Err(self.shortfall(&mut tx, request).await?);
        };

        let insert = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, user_id, event_id, ticket_count, status, total_price,
                booking_date, cancelled_at, idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id.as_str())
        .bind(booking.event_id)
        .bind(seats)
        .bind(booking.status.as_str())
        .bind(booking.total_price)
        .bind(booking.booking_date)
        .bind(booking.cancelled_at)
        .bind(booking.idempotency_key)
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // Concurrent request with the same key won; our reservation rolls back
                tx.rollback().await?;
                return Ok(Err(IdempotencyRace));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        let booked_seats_after = u32::try_from(booked_after)
            .map_err(|_| StoreError::Corrupt(format!("negative booked_seats {booked_after}")))?;

        Ok(Ok(BookingOutcome::Created {
            reservation: crate::ledger::Reservation {
                id: booking.id,
                event_id: booking.event_id,
                seats: booking.ticket_count,
                booked_seats_after,
            },
            booking,
        }))
    }
}

/// Lost a race on the idempotency index
struct IdempotencyRace;

#[async_trait]
impl Datastore for PgStore {
    async fn insert_event(&self, event: Event) -> Result<Event, StoreError> {
        let capacity = to_db_int(event.capacity)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO events (
                id, title, description, event_date, event_time, location, price, capacity,
                image, category, organizer, featured, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(event.price.value())
        .bind(capacity)
        .bind(&event.image)
        .bind(&event.category)
        .bind(&event.organizer)
        .bind(event.featured)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO seat_ledger (event_id, capacity, booked_seats)
            VALUES ($1, $2, 0)
            "#,
        )
        .bind(event.id)
        .bind(capacity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(event_id = %event.id, capacity = event.capacity, "Event and ledger entry created");
        Ok(event)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, StoreError> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let pattern = filter.search_term().map(|term| format!("%{}%", escape_like(&term)));
        let category = filter.category.as_deref().filter(|c| !c.is_empty());

        let query = format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE ($1::TEXT IS NULL OR title ILIKE $1 OR description ILIKE $1 OR location ILIKE $1)
              AND ($2::TEXT IS NULL OR category = $2)
              AND ($3::BOOLEAN IS NULL OR featured = $3)
            ORDER BY event_date, title
            "#
        );
        let rows = sqlx::query(&query)
            .bind(pattern)
            .bind(category)
            .bind(filter.featured)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn update_event(&self, event_id: Uuid, changes: EventChanges) -> Result<Event, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&query)
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DomainError::EventNotFound(event_id))?;
        let updated = event_from_row(&row)?.apply_changes(changes, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE events
            SET title = $2, description = $3, event_date = $4, event_time = $5,
                location = $6, price = $7, image = $8, category = $9,
                organizer = $10, featured = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(updated.date)
        .bind(&updated.time)
        .bind(&updated.location)
        .bind(updated.price.value())
        .bind(&updated.image)
        .bind(&updated.category)
        .bind(&updated.organizer)
        .bind(updated.featured)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_event(&self, event_id: Uuid) -> Result<bool, StoreError> {
        // seat_ledger rows cascade; bookings are kept
        let rows = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM events WHERE category <> '' ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn ledger_snapshot(&self, event_id: Uuid) -> Result<Option<LedgerSnapshot>, StoreError> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT capacity, booked_seats FROM seat_ledger WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(capacity, booked)| snapshot_from_columns(event_id, capacity, booked))
            .transpose()
    }

    async fn reserve_and_record(&self, request: BookingRequest) -> Result<BookingOutcome, StoreError> {
        match self.try_reserve_and_record(&request).await? {
            Ok(outcome) => Ok(outcome),
            Err(IdempotencyRace) => {
                // Not a retry of the write: the winner's booking is read back and replayed
                let key = request
                    .idempotency_key
                    .ok_or_else(|| StoreError::Corrupt("idempotency race without key".to_string()))?;
                let mut tx = self.pool.begin().await?;
                let existing = self
                    .find_by_idempotency_key(&mut tx, &request.user_id, key)
                    .await?
                    .ok_or_else(|| {
                        StoreError::Corrupt(format!("idempotency key {key} vanished after conflict"))
                    })?;
                tx.commit().await?;
                replay_or_conflict(existing, &request, key)
            }
        }
    }

    async fn cancel_and_release(
        &self,
        booking_id: Uuid,
        requester: &UserId,
    ) -> Result<CancelOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&query)
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DomainError::BookingNotFound(booking_id))?;
        let booking = booking_from_row(&row)?;
        let event_id = booking.event_id;

        let cancellation = booking.cancel(requester, Utc::now())?;
        let seats = cancellation.seats_to_release;

        let release = if seats == 0 {
            Release {
                released: 0,
                excess: 0,
            }
        } else {
            let row: Option<(i32, i32)> = sqlx::query_as(
                "SELECT capacity, booked_seats FROM seat_ledger WHERE event_id = $1 FOR UPDATE",
            )
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;

            match row {
                Some((capacity, booked)) => {
                    let snapshot = snapshot_from_columns(event_id, capacity, booked)?;
                    let mut entry =
                        LedgerEntry::from_parts(event_id, snapshot.capacity, snapshot.booked_seats);
                    let release = entry.release(seats);

                    sqlx::query(
                        "UPDATE seat_ledger SET booked_seats = $2, updated_at = NOW() WHERE event_id = $1",
                    )
                    .bind(event_id)
                    .bind(to_db_int(entry.booked_seats())?)
                    .execute(&mut *tx)
                    .await?;

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
            }
        };

        sqlx::query("UPDATE bookings SET status = $2, cancelled_at = $3 WHERE id = $1")
            .bind(booking_id)
            .bind(cancellation.booking.status.as_str())
            .bind(cancellation.booking.cancelled_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CancelOutcome {
            booking: cancellation.booking,
            release,
        })
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>, StoreError> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY booking_date DESC"
        );
        let rows = sqlx::query(&query)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn find_ledger_discrepancies(&self) -> Result<Vec<LedgerDiscrepancy>, StoreError> {
        let rows: Vec<(Uuid, i32, i32)> = sqlx::query_as(
            r#"
            SELECT l.event_id, l.booked_seats, COALESCE(c.confirmed_seats, 0)::INT
            FROM seat_ledger l
            LEFT JOIN (
                SELECT event_id, SUM(ticket_count) AS confirmed_seats
                FROM bookings
                WHERE status = 'confirmed'
                GROUP BY event_id
            ) c ON c.event_id = l.event_id
            WHERE l.booked_seats <> COALESCE(c.confirmed_seats, 0)
            ORDER BY l.event_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(event_id, booked, confirmed)| {
                Ok(LedgerDiscrepancy {
                    event_id,
                    booked_seats: from_db_int(booked, "booked_seats")?,
                    confirmed_seats: from_db_int(confirmed, "confirmed_seats")?,
                })
            })
            .collect()
    }
}

fn to_db_int(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("value {value} out of range")))
}

fn from_db_int(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

fn snapshot_from_columns(event_id: Uuid, capacity: i32, booked: i32) -> Result<LedgerSnapshot, StoreError> {
    let capacity = from_db_int(capacity, "capacity")?;
    let booked_seats = from_db_int(booked, "booked_seats")?;
    if booked_seats > capacity {
        return Err(StoreError::Corrupt(format!(
            "ledger for {event_id} over capacity: {booked_seats}/{capacity}"
        )));
    }
    Ok(LedgerSnapshot {
        capacity,
        booked_seats,
    })
}

/// Escape LIKE wildcards so a search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let price: Decimal = row.try_get("price")?;
    let capacity: i32 = row.try_get("capacity")?;
    let date: NaiveDate = row.try_get("event_date")?;

    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date,
        time: row.try_get("event_time")?,
        location: row.try_get("location")?,
        price: Price::new(price).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        capacity: from_db_int(capacity, "capacity")?,
        image: row.try_get("image")?,
        category: row.try_get("category")?,
        organizer: row.try_get("organizer")?,
        featured: row.try_get("featured")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let user_id: String = row.try_get("user_id")?;
    let ticket_count: i32 = row.try_get("ticket_count")?;
    let status: String = row.try_get("status")?;
    let booking_date: DateTime<Utc> = row.try_get("booking_date")?;

    Ok(Booking {
        id: row.try_get("id")?,
        user_id: UserId::new(user_id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        event_id: row.try_get("event_id")?,
        ticket_count: from_db_int(ticket_count, "ticket_count")?,
        status: status
            .parse::<BookingStatus>()
            .map_err(StoreError::Corrupt)?,
        total_price: row.try_get("total_price")?,
        booking_date,
        cancelled_at: row.try_get("cancelled_at")?,
        idempotency_key: row.try_get("idempotency_key")?,
    })
}
