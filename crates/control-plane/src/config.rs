// Server configuration loaded from environment variables
// Decision: Every knob has a default; invalid values fall back with a warning

use std::str::FromStr;
use std::time::Duration;

use crate::webhooks::DeliveryMode;

/// Read and parse an environment variable, falling back to `default` when
/// unset or unparsable
pub fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    variable = name,
                    value = %raw,
                    default = ?default,
                    "Invalid value, using default"
                );
                default
            }
        },
        _ => default,
    }
}

/// HTTP server and notification pipeline settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub http_addr: String,
    /// Optional route prefix (e.g. "/api")
    pub api_prefix: String,
    /// Allowed CORS origins; empty means same-origin only
    pub cors_allowed_origins: Vec<String>,
    /// Inline or background webhook delivery
    pub delivery_mode: DeliveryMode,
    /// Per-delivery timeout
    pub webhook_timeout: Duration,
    /// Background queue bound
    pub webhook_queue_capacity: usize,
    /// Interval between SSE heartbeat comments
    pub stream_heartbeat: Duration,
    /// Per-connection frame queue
    pub stream_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:9000".to_string(),
            api_prefix: String::new(),
            cors_allowed_origins: Vec::new(),
            delivery_mode: DeliveryMode::Inline,
            webhook_timeout: Duration::from_secs(10),
            webhook_queue_capacity: 1024,
            stream_heartbeat: Duration::from_secs(30),
            stream_buffer_size: 64,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            http_addr: std::env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
            cors_allowed_origins,
            delivery_mode: env_parse("WEBHOOK_DELIVERY_MODE", defaults.delivery_mode),
            webhook_timeout: Duration::from_secs(
                env_parse("WEBHOOK_TIMEOUT_SECS", defaults.webhook_timeout.as_secs()).max(1),
            ),
            webhook_queue_capacity: env_parse(
                "WEBHOOK_QUEUE_CAPACITY",
                defaults.webhook_queue_capacity,
            )
            .max(1),
            stream_heartbeat: Duration::from_secs(
                env_parse("STREAM_HEARTBEAT_SECS", defaults.stream_heartbeat.as_secs()).max(1),
            ),
            stream_buffer_size: env_parse("STREAM_BUFFER_SIZE", defaults.stream_buffer_size)
                .max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:9000");
        assert_eq!(config.delivery_mode, DeliveryMode::Inline);
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
        assert_eq!(config.webhook_queue_capacity, 1024);
        assert_eq!(config.stream_heartbeat, Duration::from_secs(30));
        assert_eq!(config.stream_buffer_size, 64);
    }

    #[test]
    fn test_env_parse_fallbacks() {
        std::env::set_var("MAILPLATE_TEST_NUMBER_OK", "42");
        std::env::set_var("MAILPLATE_TEST_NUMBER_BAD", "forty-two");

        assert_eq!(env_parse("MAILPLATE_TEST_NUMBER_OK", 7u64), 42);
        assert_eq!(env_parse("MAILPLATE_TEST_NUMBER_BAD", 7u64), 7);
        assert_eq!(env_parse("MAILPLATE_TEST_NUMBER_UNSET", 7u64), 7);

        // A zero timeout would fail every delivery; zero sizes are unusable
        std::env::set_var("WEBHOOK_TIMEOUT_SECS", "0");
        std::env::set_var("STREAM_HEARTBEAT_SECS", "0");
        std::env::set_var("WEBHOOK_QUEUE_CAPACITY", "0");
        std::env::set_var("STREAM_BUFFER_SIZE", "0");
        let config = ServerConfig::from_env();
        std::env::remove_var("WEBHOOK_TIMEOUT_SECS");
        std::env::remove_var("STREAM_HEARTBEAT_SECS");
        std::env::remove_var("WEBHOOK_QUEUE_CAPACITY");
        std::env::remove_var("STREAM_BUFFER_SIZE");

        assert_eq!(config.webhook_timeout, Duration::from_secs(1));
        assert_eq!(config.stream_heartbeat, Duration::from_secs(1));
        assert_eq!(config.webhook_queue_capacity, 1);
        assert_eq!(config.stream_buffer_size, 1);
    }
}
