//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `PAYMENT_SUCCESS_RATE` — simulated gateway approval probability
///   (default: `0.95`)
/// - `PAYMENT_TIMEOUT_SECS` — per-attempt charge deadline (default: `30`)
/// - `RESERVATION_TTL_SECS` — how long a Held reservation may live
///   (default: `900`)
/// - `SWEEP_INTERVAL_SECS` — stale-reservation sweep cadence (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub payment_success_rate: f64,
    pub payment_timeout: Duration,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            payment_success_rate: env_parse("PAYMENT_SUCCESS_RATE", 0.95),
            payment_timeout: Duration::from_secs(env_parse("PAYMENT_TIMEOUT_SECS", 30)),
            reservation_ttl: Duration::from_secs(env_parse("RESERVATION_TTL_SECS", 900)),
            sweep_interval: Duration::from_secs(env_parse("SWEEP_INTERVAL_SECS", 60)),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            payment_success_rate: 0.95,
            payment_timeout: Duration::from_secs(30),
            reservation_ttl: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
