//! Load Testing Tool
//!
//! Races concurrent bookings against one event and checks the ledger.
//! Uses PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store.
//!
//! Run with: cargo run --bin load_test --release -- --capacity 100 --requests 500 --tickets 1

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use uuid::Uuid;

use event_booking::domain::{NewEvent, Pricing};
use event_booking::store::BookingRequest;
use event_booking::{db, Config, Datastore, DomainError, MemoryStore, PgStore, Price, StoreError, UserId};

fn arg<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let capacity: u32 = arg(&args, "--capacity", 100);
    let requests: u32 = arg(&args, "--requests", 500);
    let tickets: u32 = arg(&args, "--tickets", 1);

    let config = Config::from_env()?;
    let store: Arc<dyn Datastore> = match &config.database_url {
        Some(url) => {
            println!("Connecting to database...");
            let pool = db::connect(url, &config).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            println!("DATABASE_URL not set; using in-memory datastore");
            Arc::new(MemoryStore::new())
        }
    };

    let event = NewEvent {
        title: format!("Load test {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
        description: String::new(),
        date: Utc::now().date_naive(),
        time: String::new(),
        location: String::new(),
        price: Price::new(rust_decimal::Decimal::TEN)?,
        capacity: Some(capacity),
        image: String::new(),
        category: "Load test".to_string(),
        organizer: "load_test".to_string(),
        featured: None,
    }
    .into_event(Uuid::new_v4(), config.default_capacity, Utc::now())?;
    let event = store.insert_event(event).await?;

    println!(
        "Load Test - {} requests x {} tickets against capacity {}",
        requests, tickets, capacity
    );

    let event_id = event.id;
    let pricing = Pricing::new(config.service_fee);
    let start = Instant::now();

    let tasks = (0..requests).map(|i| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let request = BookingRequest {
                user_id: UserId::new(format!("load_user_{i}"))?,
                event_id,
                ticket_count: tickets,
                idempotency_key: None,
                pricing,
            };
            store.reserve_and_record(request).await
        })
    });

    let mut confirmed = 0u32;
    let mut rejected = 0u32;
    let mut failed = 0u32;
    for result in join_all(tasks).await {
        match result? {
            Ok(_) => confirmed += 1,
            Err(StoreError::Domain(DomainError::InsufficientCapacity { .. })) => rejected += 1,
            Err(e) => {
                failed += 1;
                eprintln!("Unexpected error: {e}");
            }
        }
    }

    let elapsed = start.elapsed();
    let snapshot = store
        .ledger_snapshot(event.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("ledger entry missing for {}", event.id))?;
    let discrepancies = store.find_ledger_discrepancies().await?;

    println!("\n=== Load Test Results ===");
    println!("Event: {}", event.id);
    println!("Confirmed: {}", confirmed);
    println!("Rejected (sold out): {}", rejected);
    println!("Failed: {}", failed);
    println!("Booked seats: {}/{}", snapshot.booked_seats, snapshot.capacity);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!(
        "Rate: {:.0} requests/sec",
        f64::from(requests) / elapsed.as_secs_f64()
    );

    let expected_seats = confirmed * tickets;
    if snapshot.booked_seats != expected_seats || snapshot.booked_seats > snapshot.capacity {
        anyhow::bail!(
            "ledger mismatch: booked {} but {} seats confirmed",
            snapshot.booked_seats,
            expected_seats
        );
    }
    if !discrepancies.is_empty() {
        anyhow::bail!("reconciliation found {} discrepancies", discrepancies.len());
    }

    println!("Ledger verified");
    Ok(())
}
