//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use inventory::RetryPolicy;
use saga::{CircuitBreakerConfig, SagaConfig};

/// Backoff base between conflicted stock writes.
const CONFLICT_BACKOFF: Duration = Duration::from_millis(5);

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL stock ledger; in-memory when unset
/// - `BREAKER_MAX_FAILURES`: consecutive failures that open a breaker (default `5`)
/// - `BREAKER_RESET_TIMEOUT_MS`: how long a breaker stays open (default `30000`)
/// - `SAGA_STEP_TIMEOUT_MS`: bound on each remote call of the saga (default `5000`)
/// - `RESERVE_CONFLICT_RETRIES`: retries after a lost version race (default `3`)
/// - `PAYMENT_LATENCY_MS`: latency of the mock payment gateway (default `500`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub breaker_max_failures: u32,
    pub breaker_reset_timeout: Duration,
    pub step_timeout: Duration,
    pub conflict_retries: u32,
    pub payment_latency: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |key: &str, default: Duration| {
            parsed(key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            breaker_max_failures: parse_or(
                lookup("BREAKER_MAX_FAILURES"),
                defaults.breaker_max_failures,
            ),
            breaker_reset_timeout: millis("BREAKER_RESET_TIMEOUT_MS", defaults.breaker_reset_timeout),
            step_timeout: millis("SAGA_STEP_TIMEOUT_MS", defaults.step_timeout),
            conflict_retries: parse_or(
                lookup("RESERVE_CONFLICT_RETRIES"),
                defaults.conflict_retries,
            ),
            payment_latency: millis("PAYMENT_LATENCY_MS", defaults.payment_latency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            step_timeout: self.step_timeout,
            breaker: CircuitBreakerConfig {
                max_failures: self.breaker_max_failures,
                reset_timeout: self.breaker_reset_timeout,
            },
        }
    }

    /// Retry policy for stock writes that lose a version race.
    pub fn conflict_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.conflict_retries, CONFLICT_BACKOFF)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            breaker_max_failures: 5,
            breaker_reset_timeout: Duration::from_secs(30),
            step_timeout: Duration::from_secs(5),
            conflict_retries: 3,
            payment_latency: Duration::from_millis(500),
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
