//! Application state shared by all HTTP handlers.

use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::config::Config;
use crate::domain::Pricing;
use crate::handlers::{AvailabilityService, BookingManager, EventCatalog};
use crate::store::Datastore;

/// Services behind the router. Cloned per request; every field is an `Arc` inside.
#[derive(Clone)]
pub struct AppState {
    pub catalog: EventCatalog,
    pub bookings: BookingManager,
    pub availability: AvailabilityService,
    pub tokens: TokenAuthority,
    pub store: Arc<dyn Datastore>,
}

impl AppState {
    pub fn new(store: Arc<dyn Datastore>, config: &Config) -> Self {
        Self::with_settings(
            store,
            TokenAuthority::new(config.auth_token_secret.clone()),
            Pricing::new(config.service_fee),
            config.default_capacity,
        )
    }

    pub fn with_settings(
        store: Arc<dyn Datastore>,
        tokens: TokenAuthority,
        pricing: Pricing,
        default_capacity: u32,
    ) -> Self {
        Self {
            catalog: EventCatalog::new(Arc::clone(&store), default_capacity),
            bookings: BookingManager::new(Arc::clone(&store), pricing),
            availability: AvailabilityService::new(Arc::clone(&store)),
            tokens,
            store,
        }
    }
}
