//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Booking, Event, EventChanges, EventFilter, NewEvent, OperationContext};
use crate::error::AppError;
use crate::handlers::{Availability, BookingView, CreateBookingCommand};
use crate::state::AppState;

use super::extract::{ApiJson, ApiPath, ApiQuery, IdempotencyKey};
use super::middleware::{auth_middleware, AuthenticatedUser};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize)]
pub struct CancelBookingResponse {
    pub success: bool,
    pub message: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Routes under `/api`. Mutations and booking reads need a bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/events", get(list_events))
        .route("/events/categories", get(list_categories))
        .route("/events/:event_id", get(get_event))
        .route("/events/:event_id/availability", get(get_availability));

    let protected = Router::new()
        .route("/events", post(create_event))
        .route(
            "/events/:event_id",
            axum::routing::patch(update_event).delete(delete_event),
        )
        .route("/bookings", post(create_booking))
        .route("/bookings/user", get(list_user_bookings))
        .route("/bookings/:booking_id", get(get_booking))
        .route("/bookings/:booking_id/cancel", post(cancel_booking))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

// =========================================================================
// Events
// =========================================================================

/// List events, optionally filtered
async fn list_events(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(state.catalog.list(&filter).await?))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.catalog.categories().await?))
}

async fn get_event(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.catalog.get_by_id(event_id).await?))
}

/// Remaining seats from the ledger
async fn get_availability(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<Json<Availability>, AppError> {
    Ok(Json(state.availability.get_availability(event_id).await?))
}

async fn create_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiJson(data): ApiJson<NewEvent>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let event = state.catalog.create(data, &context).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(changes): ApiJson<EventChanges>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.catalog.update(event_id, changes, &context).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.catalog.delete(event_id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Bookings
// =========================================================================

/// Book tickets. 201 for a new booking, 200 for an idempotent replay.
async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    ApiJson(command): ApiJson<CreateBookingCommand>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let result = state
        .bookings
        .create_booking(&user.user_id, command, idempotency_key, &context)
        .await?;

    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result.booking)))
}

/// The caller's bookings, newest first
async fn list_user_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    Ok(Json(state.bookings.list_bookings_for_user(&user.user_id).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(booking_id): ApiPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_booking(booking_id, &user.user_id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    ApiPath(booking_id): ApiPath<Uuid>,
) -> Result<Json<CancelBookingResponse>, AppError> {
    state
        .bookings
        .cancel_booking(booking_id, &user.user_id, &context)
        .await?;

    Ok(Json(CancelBookingResponse {
        success: true,
        message: "Booking cancelled successfully".to_string(),
    }))
}
