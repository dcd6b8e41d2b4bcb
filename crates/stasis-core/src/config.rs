//! Configuration loading and typed config structures for a Stasis peer.
//!
//! The canonical configuration lives in `stasis-config.yaml` next to the
//! binary. Every section and field is optional; missing values fall back to
//! the defaults below.
//!
//! ```yaml
//! peer:
//!   identity_secret: mysecretpassword
//! infrastructure:
//!   nats_url: nats://localhost:4222
//!   dragonfly_url: redis://localhost:6379
//!   observer_port: 8080
//! ledger:
//!   db_address: supply-demand
//! channel:
//!   demand_topic: demand
//!   critical_topic: critical
//! retry:
//!   max_attempts: 5
//!   initial_delay_ms: 200
//!   max_delay_ms: 5000
//! notifications:
//!   ttl_ms: 5000
//!   milestone_every: 10
//! logging:
//!   level: info
//!   format: text
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level peer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StasisConfig {
    /// Identity of this peer.
    #[serde(default)]
    pub peer: PeerConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Where the shared ledger lives.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Broadcast topics.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Backoff for store and channel operations.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Notification behavior.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StasisConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `STASIS_PEER_ID` overrides `peer.id`
    /// - `STASIS_IDENTITY_SECRET` overrides `peer.identity_secret`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.infrastructure.apply_env_overrides();
        if let Ok(val) = std::env::var("STASIS_PEER_ID") {
            self.peer.id = Some(val);
        }
        if let Ok(val) = std::env::var("STASIS_IDENTITY_SECRET") {
            self.peer.identity_secret = val;
        }
    }
}

/// Peer identity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerConfig {
    /// Network identity of this peer. A UUID v7 is generated when unset.
    #[serde(default)]
    pub id: Option<String>,

    /// Shared secret used to derive citizen ids from peer ids.
    #[serde(default = "default_identity_secret")]
    pub identity_secret: String,
}

impl PeerConfig {
    /// The configured peer id, or a freshly generated one.
    pub fn resolve_id(&self) -> String {
        self.id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::now_v7().simple().to_string())
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            id: None,
            identity_secret: default_identity_secret(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Port of the observer JSON API.
    #[serde(default = "default_observer_port")]
    pub observer_port: u16,
}

impl InfrastructureConfig {
    /// Override infrastructure URLs with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            dragonfly_url: default_dragonfly_url(),
            observer_port: default_observer_port(),
        }
    }
}

/// Ledger store location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Name of the shared database holding the records.
    #[serde(default = "default_db_address")]
    pub db_address: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_address: default_db_address(),
        }
    }
}

/// Broadcast topics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    /// Topic carrying serialized records.
    #[serde(default = "default_demand_topic")]
    pub demand_topic: String,

    /// Topic carrying plain-text shortage alerts.
    #[serde(default = "default_critical_topic")]
    pub critical_topic: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            demand_topic: default_demand_topic(),
            critical_topic: default_critical_topic(),
        }
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Attempts including the first; 0 is treated as 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Notification behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationConfig {
    /// How long a notification stays visible, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Celebrate every N-th local demand or fulfillment.
    #[serde(default = "default_milestone_every")]
    pub milestone_every: u64,
}

impl NotificationConfig {
    /// Notification lifetime.
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            milestone_every: default_milestone_every(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

fn default_identity_secret() -> String {
    "mysecretpassword".to_owned()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_db_address() -> String {
    "supply-demand".to_owned()
}

fn default_demand_topic() -> String {
    "demand".to_owned()
}

fn default_critical_topic() -> String {
    "critical".to_owned()
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

const fn default_ttl_ms() -> u64 {
    5_000
}

const fn default_milestone_every() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_owned()
}
