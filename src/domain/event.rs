//! Event catalog types
//!
//! An event is a bookable activity. Display fields may change over time;
//! the identity and the capacity never do.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, Price};

/// Largest capacity an event may have; the seat ledger stores 32-bit signed counts
pub const MAX_CAPACITY: u32 = i32::MAX as u32;

/// A bookable event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    /// Display string, e.g. "10:00 AM - 5:00 PM"
    pub time: String,
    pub location: String,
    pub price: Price,
    pub capacity: u32,
    pub image: String,
    pub category: String,
    pub organizer: String,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Apply display-field changes. Capacity is rejected.
    pub fn apply_changes(mut self, changes: EventChanges, now: DateTime<Utc>) -> Result<Self, DomainError> {
        changes.validate()?;

        if let Some(title) = changes.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(date) = changes.date {
            self.date = date;
        }
        if let Some(time) = changes.time {
            self.time = time;
        }
        if let Some(location) = changes.location {
            self.location = location;
        }
        if let Some(price) = changes.price {
            self.price = price;
        }
        if let Some(image) = changes.image {
            self.image = image;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(organizer) = changes.organizer {
            self.organizer = organizer;
        }
        if let Some(featured) = changes.featured {
            self.featured = featured;
        }
        self.updated_at = now;

        Ok(self)
    }
}

/// Data for creating an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    pub price: Price,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl NewEvent {
    /// Build the event record, filling unset capacity and featured flag.
    pub fn into_event(
        self,
        id: Uuid,
        default_capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Event, DomainError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::InvalidEvent("title is required".to_string()));
        }

        let capacity = self.capacity.unwrap_or(default_capacity);
        if capacity == 0 {
            return Err(DomainError::InvalidEvent(
                "capacity must be at least 1".to_string(),
            ));
        }
        if capacity > MAX_CAPACITY {
            return Err(DomainError::InvalidEvent(format!(
                "capacity must not exceed {MAX_CAPACITY}"
            )));
        }

        Ok(Event {
            id,
            title,
            description: self.description,
            date: self.date,
            time: self.time,
            location: self.location,
            price: self.price,
            capacity,
            image: self.image,
            category: self.category,
            organizer: self.organizer,
            featured: self.featured.unwrap_or(false),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of an event's display fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    /// Accepted on the wire only so that it can be rejected
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl EventChanges {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.capacity.is_some() {
            return Err(DomainError::CapacityImmutable);
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(DomainError::InvalidEvent("title must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }
}

/// Catalog listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Case-insensitive match on title, description or location
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(term) = self.search_term() {
            let hit = [&event.title, &event.description, &event.location]
                .iter()
                .any(|field| field.to_lowercase().contains(&term));
            if !hit {
                return false;
            }
        }

        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if event.category != category {
                return false;
            }
        }

        if let Some(featured) = self.featured {
            if event.featured != featured {
                return false;
            }
        }

        true
    }

    /// Lowercased, trimmed search term; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}
