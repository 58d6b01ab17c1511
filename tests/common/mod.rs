//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;

use event_booking::domain::Pricing;
use event_booking::{api, AppState, Datastore, MemoryStore, PgStore, TokenAuthority, UserId};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Router over a fresh in-memory datastore
pub fn memory_app() -> (Router, Arc<dyn Datastore>) {
    let store: Arc<dyn Datastore> = Arc::new(MemoryStore::new());
    (app_for(Arc::clone(&store)), store)
}

pub fn app_for(store: Arc<dyn Datastore>) -> Router {
    let state = AppState::with_settings(
        store,
        TokenAuthority::new(TEST_SECRET),
        Pricing::default(),
        100,
    );
    api::create_router(state)
}

/// Bearer token for `user`, valid for an hour
pub fn token_for(user: &str) -> String {
    TokenAuthority::new(TEST_SECRET)
        .issue(&UserId::new(user).unwrap(), Utc::now() + Duration::hours(1))
        .unwrap()
}

/// Send one request and decode the JSON body (`Value::Null` when empty)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, user, body, &[]).await
}

pub async fn send_with_headers(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("authorization", format!("Bearer {}", token_for(user)));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, json)
}

/// Create an event through the API and return its id
pub async fn create_event(app: &Router, title: &str, price: f64, capacity: u32) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/events",
        Some("organizer"),
        Some(serde_json::json!({
            "title": title,
            "description": "Integration test event",
            "date": "2025-06-15",
            "time": "9:00 AM - 6:00 PM",
            "location": "San Francisco, CA",
            "price": price,
            "capacity": capacity,
            "category": "Technology",
            "organizer": "Test Org"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "event creation failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

/// Connect to `DATABASE_URL` and clear all tables
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query("TRUNCATE TABLE bookings, seat_ledger, events CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

pub fn pg_store(pool: PgPool) -> Arc<dyn Datastore> {
    Arc::new(PgStore::new(pool))
}
