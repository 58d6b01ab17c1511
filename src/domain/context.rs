//! Operation Context
//!
//! Per-request metadata threaded from the middleware into the services so
//! that every log line of one request shares a correlation id.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

use super::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Taken from `x-request-id`, or generated
    pub correlation_id: Uuid,

    /// Bearer of a verified token, on protected routes only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Context with a fresh correlation id and no actor
    pub fn new() -> Self {
        Self::for_request(Uuid::new_v4())
    }

    pub fn for_request(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            actor: None,
            client_ip: None,
        }
    }

    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor = Some(user_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Actor name for log fields; `anonymous` on public routes
    pub fn actor_label(&self) -> &str {
        self.actor.as_ref().map_or("anonymous", UserId::as_str)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
