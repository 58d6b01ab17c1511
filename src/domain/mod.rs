//! Domain module
//!
//! Core domain types and business rules.

pub mod booking;
pub mod context;
pub mod error;
pub mod event;
pub mod price;
pub mod user;

pub use booking::{Booking, BookingStatus, Cancellation};
pub use context::OperationContext;
pub use error::DomainError;
pub use event::{Event, EventChanges, EventFilter, NewEvent, MAX_CAPACITY};
pub use price::{Price, Pricing};
pub use user::UserId;
