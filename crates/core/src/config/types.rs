use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits for the store lock before giving up (milliseconds).
    /// Expired waits surface as transient, retryable errors.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("queuedesk.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Queue behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Digits the sequence part of a display label is padded to (`ATC-001`).
    #[serde(default = "default_label_width")]
    pub label_width: usize,

    /// Offset from UTC used to decide which calendar day a ticket belongs to.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Publish the origin cashier's next visible ticket after a transfer.
    #[serde(default = "default_auto_advance")]
    pub auto_advance_on_transfer: bool,

    #[serde(default)]
    pub allocation: AllocationConfig,
}

impl QueueConfig {
    /// The configured offset, or UTC when the value is out of range.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            label_width: default_label_width(),
            utc_offset_minutes: 0,
            auto_advance_on_transfer: default_auto_advance(),
            allocation: AllocationConfig::default(),
        }
    }
}

fn default_label_width() -> usize {
    3
}

fn default_auto_advance() -> bool {
    true
}

/// Retry budget for ticket number allocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllocationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    10
}

fn default_max_delay() -> u64 {
    200
}

/// Event publication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Capacity of the broadcast channel feeding push subscribers.
    #[serde(default = "default_event_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: SanitizedDatabaseConfig,
    pub queue: QueueConfig,
    pub events: EventsConfig,
}

/// Database config without the filesystem location.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDatabaseConfig {
    pub file_name: Option<String>,
    pub busy_timeout_ms: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: SanitizedDatabaseConfig {
                file_name: config
                    .database
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()),
                busy_timeout_ms: config.database.busy_timeout_ms,
            },
            queue: config.queue.clone(),
            events: config.events.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "queuedesk.db");
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert_eq!(config.queue.label_width, 3);
        assert!(config.queue.auto_advance_on_transfer);
        assert_eq!(config.queue.allocation.max_attempts, 5);
        assert_eq!(config.events.channel_capacity, 256);
    }

    #[test]
    fn test_deserialize_queue_section() {
        let toml = r#"
[queue]
label_width = 4
utc_offset_minutes = -300
auto_advance_on_transfer = false

[queue.allocation]
max_attempts = 8
base_delay_ms = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.queue.label_width, 4);
        assert_eq!(config.queue.utc_offset_minutes, -300);
        assert!(!config.queue.auto_advance_on_transfer);
        assert_eq!(config.queue.allocation.max_attempts, 8);
        assert_eq!(config.queue.allocation.base_delay_ms, 5);
        assert_eq!(config.queue.allocation.max_delay_ms, 200); // default
    }

    #[test]
    fn test_utc_offset() {
        let queue = QueueConfig {
            utc_offset_minutes: -300,
            ..Default::default()
        };
        assert_eq!(queue.utc_offset().local_minus_utc(), -300 * 60);

        let out_of_range = QueueConfig {
            utc_offset_minutes: 100_000,
            ..Default::default()
        };
        assert_eq!(out_of_range.utc_offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_deserialize_with_custom_database_path() {
        let toml = r#"
[database]
path = "/data/queue.sqlite"
busy_timeout_ms = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "/data/queue.sqlite");
        assert_eq!(config.database.busy_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_sanitized_config_hides_database_directory() {
        let mut config = Config::default();
        config.database.path = PathBuf::from("/srv/private/queue.db");

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.database.file_name.as_deref(), Some("queue.db"));
        assert_eq!(sanitized.server.port, 8080);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("/srv/private"));
    }
}
