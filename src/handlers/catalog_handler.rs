//! Event Catalog
//!
//! Create, read, update and delete events. Creating an event opens its
//! seat ledger entry in the same datastore call.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Event, EventChanges, EventFilter, NewEvent, OperationContext};
use crate::error::AppError;
use crate::store::Datastore;

/// Catalog service over a datastore
#[derive(Clone)]
pub struct EventCatalog {
    store: Arc<dyn Datastore>,
    default_capacity: u32,
}

impl EventCatalog {
    pub fn new(store: Arc<dyn Datastore>, default_capacity: u32) -> Self {
        Self {
            store,
            default_capacity,
        }
    }

    pub async fn get_by_id(&self, event_id: Uuid) -> Result<Event, AppError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(AppError::EventNotFound)
    }

    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, AppError> {
        Ok(self.store.list_events(filter).await?)
    }

    /// Create an event with a fresh id and an open ledger entry
    pub async fn create(&self, data: NewEvent, context: &OperationContext) -> Result<Event, AppError> {
        let event = data.into_event(Uuid::new_v4(), self.default_capacity, Utc::now())?;
        let event = self.store.insert_event(event).await?;

        tracing::info!(
            event_id = %event.id,
            capacity = event.capacity,
            actor = %context.actor_label(),
            correlation_id = %context.correlation_id,
            "Event created"
        );
        Ok(event)
    }

    /// Change display fields. Existing bookings keep their price.
    pub async fn update(
        &self,
        event_id: Uuid,
        changes: EventChanges,
        context: &OperationContext,
    ) -> Result<Event, AppError> {
        changes.validate()?;
        let event = self.store.update_event(event_id, changes).await?;

        tracing::info!(
            event_id = %event_id,
            actor = %context.actor_label(),
            correlation_id = %context.correlation_id,
            "Event updated"
        );
        Ok(event)
    }

    /// Remove an event and its ledger entry. Bookings are kept.
    pub async fn delete(&self, event_id: Uuid, context: &OperationContext) -> Result<(), AppError> {
        if !self.store.delete_event(event_id).await? {
            return Err(AppError::EventNotFound);
        }

        tracing::info!(
            event_id = %event_id,
            actor = %context.actor_label(),
            correlation_id = %context.correlation_id,
            "Event deleted"
        );
        Ok(())
    }

    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        Ok(self.store.categories().await?)
    }
}
