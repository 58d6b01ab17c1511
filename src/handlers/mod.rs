//! Command Handlers module
//!
//! Services that orchestrate catalog, booking and availability operations
//! over a [`Datastore`](crate::store::Datastore).

mod availability_handler;
mod booking_handler;
mod catalog_handler;
mod commands;

#[cfg(test)]
mod tests;

pub use availability_handler::AvailabilityService;
pub use booking_handler::BookingManager;
pub use catalog_handler::EventCatalog;
pub use commands::*;
