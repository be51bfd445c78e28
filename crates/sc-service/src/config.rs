//! Signaling Controller configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use crate::models::MIN_ROOM_CAPACITY;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address (API, health and metrics).
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default capacity of a room when the initiator does not give one.
pub const DEFAULT_ROOM_CAPACITY: u32 = 50;

/// Default ceiling for requested room capacities.
pub const DEFAULT_MAX_ROOM_CAPACITY: u32 = 1000;

/// Default ring timeout in seconds before an unanswered call is missed.
pub const DEFAULT_RING_TIMEOUT_SECONDS: u64 = 45;

/// Default grace before an emptied room is reclaimed (0 = immediately).
pub const DEFAULT_EMPTY_ROOM_GRACE_SECONDS: u64 = 0;

/// Default capacity of the event broadcast buffer.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Default SC instance ID prefix.
pub const DEFAULT_SC_ID_PREFIX: &str = "sc";

/// Which `SessionStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "SC_STORE_BACKEND must be 'redis' or 'memory', got '{other}'"
            ))),
        }
    }
}

/// Signaling Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Session store backend (default: redis).
    pub store_backend: StoreBackend,

    /// Redis connection URL, required for the redis backend.
    /// Protected by `SecretString` to prevent accidental logging.
    pub redis_url: Option<SecretString>,

    /// HTTP bind address (default: "0.0.0.0:8090").
    pub http_bind_address: String,

    /// Unique identifier for this SC instance.
    pub instance_id: String,

    /// Capacity given to rooms created without one (default: 50).
    pub default_room_capacity: u32,

    /// Largest capacity a room may request (default: 1000).
    pub max_room_capacity: u32,

    /// Seconds an unanswered call may ring before it is missed (default: 45).
    /// Zero disables the built-in watchdog.
    pub ring_timeout_seconds: u64,

    /// Seconds an emptied room waits for a re-join before being ended (default: 0).
    pub empty_room_grace_seconds: u64,

    /// Buffered events per subscriber of the broadcast publisher (default: 1024).
    pub event_buffer: usize,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store_backend", &self.store_backend)
            .field(
                "redis_url",
                &self.redis_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_bind_address", &self.http_bind_address)
            .field("instance_id", &self.instance_id)
            .field("default_room_capacity", &self.default_room_capacity)
            .field("max_room_capacity", &self.max_room_capacity)
            .field("ring_timeout_seconds", &self.ring_timeout_seconds)
            .field("empty_room_grace_seconds", &self.empty_room_grace_seconds)
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let store_backend = match vars.get("SC_STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Redis,
        };

        let redis_url = vars.get("REDIS_URL").cloned().map(SecretString::from);
        if store_backend == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingEnvVar("REDIS_URL".to_string()));
        }

        let http_bind_address = vars
            .get("SC_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let default_room_capacity = parse_or(
            vars,
            "SC_DEFAULT_ROOM_CAPACITY",
            DEFAULT_ROOM_CAPACITY,
        )?;
        let max_room_capacity = parse_or(vars, "SC_MAX_ROOM_CAPACITY", DEFAULT_MAX_ROOM_CAPACITY)?;

        if max_room_capacity < MIN_ROOM_CAPACITY {
            return Err(ConfigError::InvalidValue(format!(
                "SC_MAX_ROOM_CAPACITY must be at least {MIN_ROOM_CAPACITY}"
            )));
        }
        if default_room_capacity < MIN_ROOM_CAPACITY || default_room_capacity > max_room_capacity
        {
            return Err(ConfigError::InvalidValue(format!(
                "SC_DEFAULT_ROOM_CAPACITY must be between {MIN_ROOM_CAPACITY} and {max_room_capacity}"
            )));
        }

        let ring_timeout_seconds =
            parse_or(vars, "SC_RING_TIMEOUT_SECONDS", DEFAULT_RING_TIMEOUT_SECONDS)?;

        let empty_room_grace_seconds = parse_or(
            vars,
            "SC_EMPTY_ROOM_GRACE_SECONDS",
            DEFAULT_EMPTY_ROOM_GRACE_SECONDS,
        )?;

        let event_buffer = parse_or(vars, "SC_EVENT_BUFFER", DEFAULT_EVENT_BUFFER)?;
        if event_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "SC_EVENT_BUFFER must be greater than zero".to_string(),
            ));
        }

        // Generate SC instance ID
        let instance_id = vars.get("SC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_SC_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            store_backend,
            redis_url,
            http_bind_address,
            instance_id,
            default_room_capacity,
            max_room_capacity,
            ring_timeout_seconds,
            empty_room_grace_seconds,
            event_buffer,
        })
    }

    /// Ring timeout, or `None` when the built-in watchdog is disabled.
    #[must_use]
    pub fn ring_timeout(&self) -> Option<Duration> {
        (self.ring_timeout_seconds > 0).then(|| Duration::from_secs(self.ring_timeout_seconds))
    }

    #[must_use]
    pub fn empty_room_grace(&self) -> Duration {
        Duration::from_secs(self.empty_room_grace_seconds)
    }
}

fn parse_or<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "REDIS_URL".to_string(),
            "redis://:hunter2@localhost:6379".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(
            config.redis_url.as_ref().unwrap().expose_secret(),
            "redis://:hunter2@localhost:6379"
        );
        assert_eq!(config.http_bind_address, DEFAULT_HTTP_BIND_ADDRESS);
        assert_eq!(config.default_room_capacity, DEFAULT_ROOM_CAPACITY);
        assert_eq!(config.max_room_capacity, DEFAULT_MAX_ROOM_CAPACITY);
        assert_eq!(config.ring_timeout_seconds, DEFAULT_RING_TIMEOUT_SECONDS);
        assert_eq!(config.ring_timeout(), Some(Duration::from_secs(45)));
        assert_eq!(config.empty_room_grace(), Duration::ZERO);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        // Instance ID should be auto-generated
        assert!(config.instance_id.starts_with("sc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert(
            "SC_HTTP_BIND_ADDRESS".to_string(),
            "127.0.0.1:9090".to_string(),
        );
        vars.insert("SC_INSTANCE_ID".to_string(), "sc-custom-001".to_string());
        vars.insert("SC_DEFAULT_ROOM_CAPACITY".to_string(), "20".to_string());
        vars.insert("SC_MAX_ROOM_CAPACITY".to_string(), "200".to_string());
        vars.insert("SC_RING_TIMEOUT_SECONDS".to_string(), "30".to_string());
        vars.insert("SC_EMPTY_ROOM_GRACE_SECONDS".to_string(), "10".to_string());
        vars.insert("SC_EVENT_BUFFER".to_string(), "64".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.http_bind_address, "127.0.0.1:9090");
        assert_eq!(config.instance_id, "sc-custom-001");
        assert_eq!(config.default_room_capacity, 20);
        assert_eq!(config.max_room_capacity, 200);
        assert_eq!(config.ring_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.empty_room_grace(), Duration::from_secs(10));
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_zero_ring_timeout_disables_watchdog() {
        let mut vars = base_vars();
        vars.insert("SC_RING_TIMEOUT_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.ring_timeout(), None);
    }

    #[test]
    fn test_from_vars_missing_redis_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "REDIS_URL"));
    }

    #[test]
    fn test_memory_backend_does_not_need_redis() {
        let vars = HashMap::from([("SC_STORE_BACKEND".to_string(), "memory".to_string())]);

        let config = Config::from_vars(&vars).expect("memory backend needs no REDIS_URL");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut vars = base_vars();
        vars.insert("SC_STORE_BACKEND".to_string(), "postgres".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_unparseable_number_rejected() {
        let mut vars = base_vars();
        vars.insert("SC_RING_TIMEOUT_SECONDS".to_string(), "soon".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("SC_RING_TIMEOUT_SECONDS"))
        );
    }

    #[test]
    fn test_default_capacity_must_fit_ceiling() {
        let mut vars = base_vars();
        vars.insert("SC_DEFAULT_ROOM_CAPACITY".to_string(), "500".to_string());
        vars.insert("SC_MAX_ROOM_CAPACITY".to_string(), "100".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        vars.insert("SC_DEFAULT_ROOM_CAPACITY".to_string(), "1".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("redis://"));
        assert!(!debug_output.contains("hunter2"));
    }
}
