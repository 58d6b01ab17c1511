//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use rand::RngCore;
use rust_decimal::Decimal;

use crate::domain::{Price, MAX_CAPACITY};

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL; in-memory datastore when unset
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// `pretty` or `json`
    pub log_format: LogFormat,

    /// Shared secret for bearer token signatures
    pub auth_token_secret: String,

    /// Per-ticket fee added to the event price
    pub service_fee: Decimal,

    /// Capacity for events created without one
    pub default_capacity: u32,

    pub request_timeout: Duration,

    /// Ledger reconciliation period; `None` disables the job
    pub reconcile_interval: Option<Duration>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = parse_or(&lookup, "PORT", 5002)?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let log_format = parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?;

        let auth_token_secret = match lookup("AUTH_TOKEN_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if environment == "production" => {
                return Err(ConfigError::MissingEnv("AUTH_TOKEN_SECRET"));
            }
            None => {
                tracing::warn!(
                    "AUTH_TOKEN_SECRET not set; generated a random secret. Tokens will not survive a restart."
                );
                random_secret()
            }
        };

        let service_fee: Decimal = parse_or(&lookup, "SERVICE_FEE", Decimal::new(250, 2))?;
        // Same bounds as a ticket price, so totals fit the bookings column
        Price::new(service_fee).map_err(|_| ConfigError::InvalidValue("SERVICE_FEE"))?;

        let default_capacity: u32 = parse_or(&lookup, "DEFAULT_CAPACITY", 100)?;
        if default_capacity == 0 || default_capacity > MAX_CAPACITY {
            return Err(ConfigError::InvalidValue("DEFAULT_CAPACITY"));
        }

        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS"));
        }

        let reconcile_interval_secs: u64 = parse_or(&lookup, "RECONCILE_INTERVAL_SECS", 300)?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            log_format,
            auth_token_secret,
            service_fee,
            default_capacity,
            request_timeout: Duration::from_secs(request_timeout_secs),
            reconcile_interval: (reconcile_interval_secs > 0)
                .then(|| Duration::from_secs(reconcile_interval_secs)),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

// Keeps the secret and database credentials out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("database_max_connections", &self.database_max_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("log_format", &self.log_format)
            .field("auth_token_secret", &"***")
            .field("service_fee", &self.service_fee)
            .field("default_capacity", &self.default_capacity)
            .field("request_timeout", &self.request_timeout)
            .field("reconcile_interval", &self.reconcile_interval)
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
