//! Service-level tests on the in-memory datastore

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::domain::{
    BookingStatus, DomainError, EventChanges, EventFilter, NewEvent, OperationContext, Price,
    Pricing, UserId,
};
use crate::error::AppError;
use crate::handlers::{AvailabilityService, BookingManager, CreateBookingCommand, EventCatalog};
use crate::store::{Datastore, MemoryStore};

struct Services {
    catalog: EventCatalog,
    bookings: BookingManager,
    availability: AvailabilityService,
}

fn services() -> Services {
    let store: Arc<dyn Datastore> = Arc::new(MemoryStore::new());
    Services {
        catalog: EventCatalog::new(Arc::clone(&store), 100),
        bookings: BookingManager::new(Arc::clone(&store), Pricing::default()),
        availability: AvailabilityService::new(store),
    }
}

fn user(name: &str) -> UserId {
    UserId::new(name).unwrap()
}

fn new_event(capacity: Option<u32>) -> NewEvent {
    NewEvent {
        title: "Jazz Night".to_string(),
        description: "Live jazz in the park".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(),
        time: "8:00 PM - 11:00 PM".to_string(),
        location: "Central Park".to_string(),
        price: Price::new(dec!(45)).unwrap(),
        capacity,
        image: String::new(),
        category: "Music".to_string(),
        organizer: "City Arts".to_string(),
        featured: None,
    }
}

// =========================================================================
// Catalog
// =========================================================================

#[tokio::test]
async fn test_create_event_defaults() {
    let s = services();
    let ctx = OperationContext::new();

    let event = s.catalog.create(new_event(None), &ctx).await.unwrap();

    assert_eq!(event.capacity, 100);
    assert!(!event.featured);
    assert_eq!(s.catalog.get_by_id(event.id).await.unwrap(), event);

    let availability = s.availability.get_availability(event.id).await.unwrap();
    assert!(availability.available);
    assert_eq!(availability.remaining_seats, 100);
}

#[tokio::test]
async fn test_update_rejects_capacity_change() {
    let s = services();
    let ctx = OperationContext::new();
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();

    let changes = EventChanges {
        capacity: Some(20),
        ..Default::default()
    };
    let result = s.catalog.update(event.id, changes, &ctx).await;

    assert!(matches!(result, Err(AppError::Domain(DomainError::CapacityImmutable))));
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 10);
}

#[tokio::test]
async fn test_delete_unknown_event() {
    let s = services();
    let result = s.catalog.delete(Uuid::new_v4(), &OperationContext::new()).await;
    assert!(matches!(result, Err(AppError::EventNotFound)));
}

#[tokio::test]
async fn test_list_with_filter() {
    let s = services();
    let ctx = OperationContext::new();
    s.catalog.create(new_event(None), &ctx).await.unwrap();
    let mut other = new_event(None);
    other.title = "Tech Summit".to_string();
    other.category = "Technology".to_string();
    other.featured = Some(true);
    s.catalog.create(other, &ctx).await.unwrap();

    let filter = EventFilter {
        featured: Some(true),
        ..Default::default()
    };
    let featured = s.catalog.list(&filter).await.unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].title, "Tech Summit");

    assert_eq!(
        s.catalog.categories().await.unwrap(),
        vec!["Music".to_string(), "Technology".to_string()]
    );
}

// =========================================================================
// Bookings
// =========================================================================

#[tokio::test]
async fn test_booking_decrements_availability_once() {
    let s = services();
    let ctx = OperationContext::new();
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();

    let result = s
        .bookings
        .create_booking(&user("alice"), CreateBookingCommand::new(event.id, 3), None, &ctx)
        .await
        .unwrap();

    assert!(!result.replayed);
    assert_eq!(result.booking.status, BookingStatus::Confirmed);
    // 3 × (45 + 2.50)
    assert_eq!(result.booking.total_price, dec!(142.50));
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 7);
}

#[tokio::test]
async fn test_invalid_ticket_counts() {
    let s = services();
    let ctx = OperationContext::new();
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();

    for count in [0, -2] {
        let result = s
            .bookings
            .create_booking(&user("alice"), CreateBookingCommand::new(event.id, count), None, &ctx)
            .await;
        assert!(
            matches!(result, Err(AppError::Domain(DomainError::InvalidTicketCount(n))) if n == count),
            "count {count}"
        );
    }

    let huge = i64::from(u32::MAX) + 1;
    let result = s
        .bookings
        .create_booking(&user("alice"), CreateBookingCommand::new(event.id, huge), None, &ctx)
        .await;
    assert!(matches!(
        result,
        Err(AppError::Domain(DomainError::TicketCountTooLarge(n))) if n == huge
    ));
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 10);
}

#[tokio::test]
async fn test_booking_unknown_event() {
    let s = services();
    let result = s
        .bookings
        .create_booking(
            &user("alice"),
            CreateBookingCommand::new(Uuid::new_v4(), 1),
            None,
            &OperationContext::new(),
        )
        .await;

    assert!(matches!(result, Err(AppError::Domain(DomainError::EventNotFound(_)))));
}

#[tokio::test]
async fn test_price_change_keeps_booking_total() {
    let s = services();
    let ctx = OperationContext::new();
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();
    let booking = s
        .bookings
        .create_booking(&user("alice"), CreateBookingCommand::new(event.id, 2), None, &ctx)
        .await
        .unwrap()
        .booking;

    let changes = EventChanges::default().with_price(Price::new(dec!(99)).unwrap());
    s.catalog.update(event.id, changes, &ctx).await.unwrap();

    let stored = s.bookings.get_booking(booking.id, &user("alice")).await.unwrap();
    assert_eq!(stored.total_price, dec!(95.00));
}

#[tokio::test]
async fn test_cancel_restores_exactly_once() {
    let s = services();
    let ctx = OperationContext::new();
    let alice = user("alice");
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();
    let booking = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(event.id, 4), None, &ctx)
        .await
        .unwrap()
        .booking;

    let cancelled = s.bookings.cancel_booking(booking.id, &alice, &ctx).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 10);

    let again = s.bookings.cancel_booking(booking.id, &alice, &ctx).await;
    assert!(matches!(again, Err(AppError::Domain(DomainError::AlreadyCancelled(_)))));
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 10);
}

#[tokio::test]
async fn test_foreign_booking_access() {
    let s = services();
    let ctx = OperationContext::new();
    let event = s.catalog.create(new_event(Some(5)), &ctx).await.unwrap();
    let booking = s
        .bookings
        .create_booking(&user("alice"), CreateBookingCommand::new(event.id, 2), None, &ctx)
        .await
        .unwrap()
        .booking;

    let cancel = s.bookings.cancel_booking(booking.id, &user("mallory"), &ctx).await;
    assert!(matches!(cancel, Err(AppError::Domain(DomainError::NotBookingOwner(_)))));

    let read = s.bookings.get_booking(booking.id, &user("mallory")).await;
    assert!(matches!(read, Err(AppError::Domain(DomainError::NotBookingOwner(_)))));

    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 3);
}

#[tokio::test]
async fn test_idempotent_replay() {
    let s = services();
    let ctx = OperationContext::new();
    let alice = user("alice");
    let key = Uuid::new_v4();
    let event = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();

    let first = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(event.id, 2), Some(key), &ctx)
        .await
        .unwrap();
    let second = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(event.id, 2), Some(key), &ctx)
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(second.booking.id, first.booking.id);
    assert_eq!(s.availability.get_availability(event.id).await.unwrap().remaining_seats, 8);

    let conflict = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(event.id, 3), Some(key), &ctx)
        .await;
    assert!(matches!(conflict, Err(AppError::Domain(DomainError::IdempotencyConflict(k))) if k == key));
}

#[tokio::test]
async fn test_list_bookings_newest_first_with_deleted_event() {
    let s = services();
    let ctx = OperationContext::new();
    let alice = user("alice");
    let kept = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();
    let deleted = s.catalog.create(new_event(Some(10)), &ctx).await.unwrap();

    let first = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(kept.id, 1), None, &ctx)
        .await
        .unwrap()
        .booking;
    let second = s
        .bookings
        .create_booking(&alice, CreateBookingCommand::new(deleted.id, 1), None, &ctx)
        .await
        .unwrap()
        .booking;
    s.catalog.delete(deleted.id, &ctx).await.unwrap();

    let views = s.bookings.list_bookings_for_user(&alice).await.unwrap();
    assert_eq!(views.len(), 2);

    let orphan = views.iter().find(|v| v.booking.id == second.id).unwrap();
    assert!(orphan.event.is_none());
    let json = serde_json::to_value(orphan).unwrap();
    assert!(json.get("event").is_none());

    let live = views.iter().find(|v| v.booking.id == first.id).unwrap();
    assert_eq!(live.event.as_ref().map(|e| e.id), Some(kept.id));

    assert!(views[0].booking.booking_date >= views[1].booking.booking_date);
    assert!(s.bookings.list_bookings_for_user(&user("bob")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_last_seat_race() {
    let s = services();
    let ctx = OperationContext::new();
    let event_id = s.catalog.create(new_event(Some(1)), &ctx).await.unwrap().id;

    let bookings = s.bookings.clone();
    let a = {
        let bookings = bookings.clone();
        tokio::spawn(async move {
            bookings
                .create_booking(
                    &user("alice"),
                    CreateBookingCommand::new(event_id, 1),
                    None,
                    &OperationContext::new(),
                )
                .await
        })
    };
    let b = tokio::spawn(async move {
        bookings
            .create_booking(
                &user("bob"),
                CreateBookingCommand::new(event_id, 1),
                None,
                &OperationContext::new(),
            )
            .await
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let confirmed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Domain(DomainError::InsufficientCapacity { .. }))))
        .count();

    assert_eq!(confirmed, 1);
    assert_eq!(rejected, 1);
    let availability = s.availability.get_availability(event_id).await.unwrap();
    assert!(!availability.available);
    assert_eq!(availability.remaining_seats, 0);
}

#[tokio::test]
async fn test_availability_unknown_event() {
    let s = services();
    let result = s.availability.get_availability(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::EventNotFound)));
}
