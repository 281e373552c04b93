//! Signal relay configuration.
//!
//! Configuration is loaded from environment variables, with defaults for
//! everything so a bare `relay-service` starts a usable local relay.

use common::config::{LogFormat, ObservabilityConfig};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default maximum number of live connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Default maximum number of members in one room.
pub const DEFAULT_MAX_ROOM_MEMBERS: usize = 50;

/// Default maximum inbound WebSocket message size (64 KiB; SDP offers fit easily).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default server ping interval in seconds.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECONDS: u64 = 15;

/// Default idle read timeout in seconds.
pub const DEFAULT_CLIENT_TIMEOUT_SECONDS: u64 = 30;

/// Default tracing filter when `RUST_LOG` is not set.
///
/// `relay` covers the explicit `relay.*` event targets (`relay.ws`,
/// `relay.actor.registry`, `relay.actor.mailbox`, `relay.http`), which the
/// crate-name directive does not match.
pub const DEFAULT_LOG_FILTER: &str = "relay_service=info,relay=info,tower_http=info";

/// Relay instance ID prefix.
pub const DEFAULT_RELAY_ID_PREFIX: &str = "relay";

/// Which origins the CORS layer allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// Any origin (`*`).
    Any,
    /// An explicit allow-list.
    List(Vec<String>),
}

/// Signal relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP + WebSocket bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identifier for this relay instance (logs only).
    pub relay_id: String,

    /// Maximum concurrent live connections.
    pub max_connections: usize,

    /// Maximum members per room.
    pub max_room_members: usize,

    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_bytes: usize,

    /// Capacity of each connection's outbound queue. A peer that falls this
    /// far behind is evicted.
    pub outbound_queue_capacity: usize,

    /// Interval between server-initiated pings.
    pub keepalive_interval: Duration,

    /// Close a connection that has sent nothing for this long.
    pub client_timeout: Duration,

    /// Whether `signal_received` is also delivered back to the sender.
    pub echo_signals_to_sender: bool,

    /// CORS allowed origins.
    pub cors_allowed_origins: CorsOrigins,

    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            relay_id: format!("{DEFAULT_RELAY_ID_PREFIX}-local"),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_room_members: DEFAULT_MAX_ROOM_MEMBERS,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_INTERVAL_SECONDS),
            client_timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECONDS),
            echo_signals_to_sender: true,
            cors_allowed_origins: CorsOrigins::Any,
            observability: ObservabilityConfig {
                log_filter: DEFAULT_LOG_FILTER.to_string(),
                log_format: LogFormat::Text,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
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
        let defaults = Config::default();

        let bind_address = vars
            .get("RELAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or(defaults.bind_address);

        let max_connections = parse_var(vars, "RELAY_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let max_room_members =
            parse_var(vars, "RELAY_MAX_ROOM_MEMBERS", DEFAULT_MAX_ROOM_MEMBERS)?;
        let max_message_bytes =
            parse_var(vars, "RELAY_MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES)?;
        let outbound_queue_capacity = parse_var(
            vars,
            "RELAY_OUTBOUND_QUEUE_CAPACITY",
            DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        )?;

        for (name, value) in [
            ("RELAY_MAX_CONNECTIONS", max_connections),
            ("RELAY_MAX_ROOM_MEMBERS", max_room_members),
            ("RELAY_MAX_MESSAGE_BYTES", max_message_bytes),
            ("RELAY_OUTBOUND_QUEUE_CAPACITY", outbound_queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let keepalive_secs = parse_var(
            vars,
            "RELAY_KEEPALIVE_INTERVAL_SECONDS",
            DEFAULT_KEEPALIVE_INTERVAL_SECONDS,
        )?;
        let client_timeout_secs = parse_var(
            vars,
            "RELAY_CLIENT_TIMEOUT_SECONDS",
            DEFAULT_CLIENT_TIMEOUT_SECONDS,
        )?;

        if keepalive_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_KEEPALIVE_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }
        if client_timeout_secs <= keepalive_secs {
            return Err(ConfigError::InvalidValue(format!(
                "RELAY_CLIENT_TIMEOUT_SECONDS ({client_timeout_secs}) must exceed \
                 RELAY_KEEPALIVE_INTERVAL_SECONDS ({keepalive_secs})"
            )));
        }

        let echo_signals_to_sender = match vars.get("RELAY_ECHO_SIGNALS_TO_SENDER") {
            Some(raw) => parse_bool("RELAY_ECHO_SIGNALS_TO_SENDER", raw)?,
            None => true,
        };

        let cors_allowed_origins = match vars.get("RELAY_CORS_ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(raw)?,
            None => CorsOrigins::Any,
        };

        let log_format = match vars.get("RELAY_LOG_FORMAT") {
            Some(raw) => LogFormat::from_str(raw).map_err(ConfigError::InvalidValue)?,
            None => LogFormat::Text,
        };

        let relay_id = vars.get("RELAY_ID").cloned().unwrap_or_else(|| {
            let hostname = vars
                .get("HOSTNAME")
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RELAY_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            relay_id,
            max_connections,
            max_room_members,
            max_message_bytes,
            outbound_queue_capacity,
            keepalive_interval: Duration::from_secs(keepalive_secs),
            client_timeout: Duration::from_secs(client_timeout_secs),
            echo_signals_to_sender,
            cors_allowed_origins,
            observability: ObservabilityConfig {
                log_filter: DEFAULT_LOG_FILTER.to_string(),
                log_format,
            },
        })
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw} is not a valid number"))),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{name}={raw} is not a valid boolean"
        ))),
    }
}

fn parse_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    let raw = raw.trim();
    if raw == "*" {
        return Ok(CorsOrigins::Any);
    }

    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect();

    if origins.is_empty() {
        return Err(ConfigError::InvalidValue(
            "RELAY_CORS_ALLOWED_ORIGINS must be '*' or a comma-separated origin list".to_string(),
        ));
    }

    Ok(CorsOrigins::List(origins))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    /// Collects formatted log lines.
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_log_filter_enables_relay_targets() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let subscriber = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || CaptureWriter(Arc::clone(&sink))),
            );

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "relay.actor.registry", "evicting slow connection");
            tracing::info!(target: "relay.ws", "connection opened");
            tracing::warn!(target: "relay.actor.mailbox", "mailbox depth critical");
            tracing::info!("service started");
            tracing::debug!(target: "relay.ws", "read failed");
        });

        let output = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        assert!(output.contains("evicting slow connection"), "{output}");
        assert!(output.contains("connection opened"), "{output}");
        assert!(output.contains("mailbox depth critical"), "{output}");
        assert!(output.contains("service started"), "{output}");
        assert!(!output.contains("read failed"), "{output}");
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.max_room_members, DEFAULT_MAX_ROOM_MEMBERS);
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
        assert_eq!(
            config.outbound_queue_capacity,
            DEFAULT_OUTBOUND_QUEUE_CAPACITY
        );
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
        assert_eq!(config.client_timeout, Duration::from_secs(30));
        assert!(config.echo_signals_to_sender);
        assert_eq!(config.cors_allowed_origins, CorsOrigins::Any);
        assert_eq!(config.observability.log_format, LogFormat::Text);
        // Relay ID should be auto-generated
        assert!(config.relay_id.starts_with("relay-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("RELAY_ID".to_string(), "relay-custom-001".to_string()),
            ("RELAY_MAX_CONNECTIONS".to_string(), "500".to_string()),
            ("RELAY_MAX_ROOM_MEMBERS".to_string(), "8".to_string()),
            ("RELAY_MAX_MESSAGE_BYTES".to_string(), "16384".to_string()),
            ("RELAY_OUTBOUND_QUEUE_CAPACITY".to_string(), "32".to_string()),
            ("RELAY_KEEPALIVE_INTERVAL_SECONDS".to_string(), "5".to_string()),
            ("RELAY_CLIENT_TIMEOUT_SECONDS".to_string(), "12".to_string()),
            ("RELAY_ECHO_SIGNALS_TO_SENDER".to_string(), "false".to_string()),
            (
                "RELAY_CORS_ALLOWED_ORIGINS".to_string(),
                "https://a.example, https://b.example".to_string(),
            ),
            ("RELAY_LOG_FORMAT".to_string(), "json".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.relay_id, "relay-custom-001");
        assert_eq!(config.max_connections, 500);
        assert_eq!(config.max_room_members, 8);
        assert_eq!(config.max_message_bytes, 16384);
        assert_eq!(config.outbound_queue_capacity, 32);
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
        assert_eq!(config.client_timeout, Duration::from_secs(12));
        assert!(!config.echo_signals_to_sender);
        assert_eq!(
            config.cors_allowed_origins,
            CorsOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_from_vars_rejects_non_numeric() {
        let vars = HashMap::from([("RELAY_MAX_ROOM_MEMBERS".to_string(), "lots".to_string())]);
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("RELAY_MAX_ROOM_MEMBERS")));
    }

    #[test]
    fn test_from_vars_rejects_zero_capacity() {
        let vars = HashMap::from([(
            "RELAY_OUTBOUND_QUEUE_CAPACITY".to_string(),
            "0".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_timeout_must_exceed_keepalive() {
        let vars = HashMap::from([
            ("RELAY_KEEPALIVE_INTERVAL_SECONDS".to_string(), "20".to_string()),
            ("RELAY_CLIENT_TIMEOUT_SECONDS".to_string(), "20".to_string()),
        ]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_bad_bool_and_format() {
        let vars = HashMap::from([(
            "RELAY_ECHO_SIGNALS_TO_SENDER".to_string(),
            "maybe".to_string(),
        )]);
        assert!(Config::from_vars(&vars).is_err());

        let vars = HashMap::from([("RELAY_LOG_FORMAT".to_string(), "xml".to_string())]);
        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn test_empty_origin_list_rejected() {
        let vars = HashMap::from([("RELAY_CORS_ALLOWED_ORIGINS".to_string(), " , ".to_string())]);
        assert!(Config::from_vars(&vars).is_err());
    }
}
