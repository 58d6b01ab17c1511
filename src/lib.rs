//! event_booking Library
//!
//! Event catalog, seat ledger and booking service. Re-exports modules for
//! the server binary, the load-test tool and integration tests.

pub mod api;
pub mod auth;
pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod state;
pub mod store;

pub mod config;
pub mod db;
mod error;

pub use auth::{AuthError, TokenAuthority};
pub use config::Config;
pub use domain::{Booking, BookingStatus, DomainError, Event, OperationContext, Price, UserId};
pub use error::{AppError, AppResult};
pub use state::AppState;
pub use store::{Datastore, MemoryStore, PgStore, StoreError};
