//! Scheduled Jobs
//!
//! Background jobs that check system health on a schedule. They report
//! and never mutate state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};

use crate::store::{Datastore, LedgerDiscrepancy, StoreError};

// =========================================================================
// Ledger reconciliation
// =========================================================================

/// Compare every ledger entry with the tickets of its confirmed bookings.
/// Each mismatch is logged at error level.
pub async fn reconcile_ledger(store: &dyn Datastore) -> Result<Vec<LedgerDiscrepancy>, JobError> {
    let discrepancies = store.find_ledger_discrepancies().await?;

    if discrepancies.is_empty() {
        tracing::debug!("Ledger reconciliation clean");
    }
    for d in &discrepancies {
        tracing::error!(
            event_id = %d.event_id,
            booked_seats = d.booked_seats,
            confirmed_seats = d.confirmed_seats,
            "Seat ledger disagrees with confirmed bookings"
        );
    }

    Ok(discrepancies)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for ledger reconciliation (default: 5 minutes)
    pub reconcile_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(300),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    store: Arc<dyn Datastore>,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self {
            store,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(store: Arc<dyn Datastore>, config: JobSchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!(
            reconcile_interval_secs = self.config.reconcile_interval.as_secs(),
            "Job scheduler started"
        );

        let mut reconcile_interval = interval(self.config.reconcile_interval);
        reconcile_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            reconcile_interval.tick().await;
            if let Err(e) = reconcile_ledger(self.store.as_ref()).await {
                tracing::error!(error = %e, "Ledger reconciliation failed");
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match reconcile_ledger(self.store.as_ref()).await {
            Ok(discrepancies) => report.discrepancies = discrepancies,
            Err(e) => report.errors.push(format!("Ledger reconciliation: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub discrepancies: Vec<LedgerDiscrepancy>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Datastore error: {0}")]
    Store(#[from] StoreError),
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewEvent, Price, Pricing, UserId};
    use crate::store::{BookingRequest, MemoryStore};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.reconcile_interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_reconcile_clean_store() {
        let store = Arc::new(MemoryStore::new());
        let event = NewEvent {
            title: "Food Festival".to_string(),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2025, 9, 20).unwrap(),
            time: String::new(),
            location: "Harbor".to_string(),
            price: Price::new(dec!(15)).unwrap(),
            capacity: Some(50),
            image: String::new(),
            category: "Food".to_string(),
            organizer: "Harbor Eats".to_string(),
            featured: None,
        }
        .into_event(Uuid::new_v4(), 100, Utc::now())
        .unwrap();
        let event = store.insert_event(event).await.unwrap();

        store
            .reserve_and_record(BookingRequest {
                user_id: UserId::new("usr_1").unwrap(),
                event_id: event.id,
                ticket_count: 4,
                idempotency_key: None,
                pricing: Pricing::default(),
            })
            .await
            .unwrap();

        let scheduler = JobScheduler::new(store);
        let report = scheduler.run_all_once().await;

        assert!(report.discrepancies.is_empty());
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert!(report.discrepancies.is_empty());
        assert_eq!(report.errors.len(), 0);
    }
}
