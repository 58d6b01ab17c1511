//! API Middleware
//!
//! Request context, bearer authentication and request logging.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::bearer_token;
use crate::domain::{OperationContext, UserId};
use crate::error::AppError;
use crate::state::AppState;

/// Header set by `SetRequestIdLayer`
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// User resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

// =========================================================================
// Operation context
// =========================================================================

/// Build the `OperationContext` for every request
pub async fn context_middleware(mut request: Request<Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let mut context = OperationContext::for_request(correlation_id);
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        context = context.with_client_ip(addr.ip());
    }

    request.extensions_mut().insert(context);
    next.run(request).await
}

// =========================================================================
// Bearer token authentication
// =========================================================================

/// Verify `Authorization: Bearer <token>` and attach the user
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let user_id = match bearer_token(header).and_then(|token| state.tokens.verify(token)) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::debug!(reason = %e, "Rejected bearer token");
            return Err(AppError::Unauthenticated(e).into_response());
        }
    };

    let context = request
        .extensions()
        .get::<OperationContext>()
        .cloned()
        .unwrap_or_default()
        .with_actor(user_id.clone());

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers whose values never reach the logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Header list for debug logs with credentials replaced by `[REDACTED]`
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.to_string(), shown)
        })
        .collect()
}

/// One line per request on arrival and one on completion. Runs inside
/// `context_middleware`, so the correlation id is already known.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .map(|ctx| ctx.correlation_id);

    tracing::debug!(
        method = %method,
        path = %path,
        correlation_id = ?correlation_id,
        headers = ?mask_headers_for_logging(request.headers()),
        "Incoming request"
    );

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if status.is_server_error() {
        tracing::error!(method = %method, path = %path, status = %status, duration_ms, correlation_id = ?correlation_id, "Request failed");
    } else {
        tracing::info!(method = %method, path = %path, status = %status, duration_ms, correlation_id = ?correlation_id, "Request completed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer abc.123.def".parse().unwrap());
        headers.insert("idempotency-key", "k-1".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let key = masked.iter().find(|(k, _)| k == "idempotency-key");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(key.unwrap().1, "k-1");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(SENSITIVE_HEADERS.contains(&"cookie"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }
}
