//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(#[from] AuthError),

    #[error("Event not found")]
    EventNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(e) => AppError::Domain(e),
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::EventNotFound | AppError::BookingNotFound => StatusCode::NOT_FOUND,

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InvalidTicketCount(_)
                | DomainError::TicketCountTooLarge(_)
                | DomainError::InvalidEvent(_)
                | DomainError::InvalidPrice(_)
                | DomainError::InvalidUserId
                | DomainError::CapacityImmutable => StatusCode::BAD_REQUEST,
                DomainError::NotBookingOwner(_) => StatusCode::FORBIDDEN,
                DomainError::EventNotFound(_) | DomainError::BookingNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                DomainError::InsufficientCapacity { .. }
                | DomainError::AlreadyCancelled(_)
                | DomainError::IdempotencyConflict(_)
                | DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
            },

            // 500 Internal Server Error
            AppError::Database(_) | AppError::Internal(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "Database error");
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "Internal server error".to_string()
            }
            AppError::Config(e) => {
                tracing::error!(error = ?e, "Config error");
                "Internal server error".to_string()
            }
            AppError::Domain(DomainError::InsufficientCapacity { .. }) => {
                "Not enough seats available".to_string()
            }
            AppError::Unauthenticated(_) => "Authentication required".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
