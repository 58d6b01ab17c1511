//! Availability Query Service
//!
//! Remaining seats come from the seat ledger only.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;
use crate::store::Datastore;

use super::Availability;

#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn Datastore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Unknown events are `EventNotFound`
    pub async fn get_availability(&self, event_id: Uuid) -> Result<Availability, AppError> {
        let snapshot = self
            .store
            .ledger_snapshot(event_id)
            .await?
            .ok_or(AppError::EventNotFound)?;

        Ok(Availability::from_remaining(snapshot.remaining_seats()))
    }
}
