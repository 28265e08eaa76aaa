//! Server settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file
//! (`pulse.toml`, or the path in `PULSE_CONFIG`), then environment variables
//! such as `PULSE__CACHE__NAMESPACE=budget:`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use pulse_cache::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::monitor::{MonitorConfig, ResourceConfig};
use crate::query::QueryConfig;

/// Error al cargar la configuracion.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid listen address {0}")]
    Address(String),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Top-level settings of the server process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub query: QuerySettings,
    pub monitor: MonitorSettings,
    pub resources: ResourceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origenes del frontend admitidos por CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Which store backs the cache client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub url: String,
    pub namespace: String,
    pub default_ttl_secs: u64,
    /// Entry cap of the in-process store.
    pub memory_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: "finance:".to_string(),
            default_ttl_secs: 3600,
            memory_capacity: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub slow_query_ms: u64,
    /// Samples kept per signature.
    pub ring_capacity: usize,
    /// Minimum average duration for an index suggestion.
    pub suggestion_min_avg_ms: u64,
    pub max_age_secs: u64,
    /// Samples kept across every signature; the oldest go first.
    pub max_total_samples: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            slow_query_ms: 1000,
            ring_capacity: 1000,
            suggestion_min_avg_ms: 500,
            max_age_secs: 86_400,
            max_total_samples: 50_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub slow_request_ms: u64,
    pub max_samples: usize,
    pub cleanup_interval_secs: u64,
    pub max_age_secs: u64,
    pub health_max_error_rate: f64,
    pub health_max_avg_ms: f64,
    pub health_window_secs: u64,
    /// Window of `getEndpointStats` when the caller gives none.
    pub default_window_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            slow_request_ms: 1000,
            max_samples: 10_000,
            cleanup_interval_secs: 3600,
            max_age_secs: 86_400,
            health_max_error_rate: 5.0,
            health_max_avg_ms: 1000.0,
            health_window_secs: 60,
            default_window_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSettings {
    pub interval_secs: u64,
    pub memory_threshold_percent: f64,
    pub load_threshold_percent: f64,
    pub alert_capacity: usize,
    /// Memory budget of the process. Sin limite se compara contra la memoria del host.
    pub memory_limit_bytes: Option<u64>,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            memory_threshold_percent: 80.0,
            load_threshold_percent: 80.0,
            alert_capacity: 50,
            memory_limit_bytes: None,
        }
    }
}

impl Settings {
    /// Loads settings from `pulse.toml` (or `$PULSE_CONFIG`) and `PULSE__*` variables.
    pub fn load() -> Result<Self, SettingsError> {
        let file = match std::env::var("PULSE_CONFIG") {
            Ok(path) => File::from(PathBuf::from(path)).required(true),
            Err(_) => File::with_name("pulse").required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from TOML text, without the environment layer.
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values that would stop a background task or empty a buffer.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.monitor.cleanup_interval_secs == 0 {
            return Err(invalid("monitor.cleanup_interval_secs", "must be at least 1"));
        }
        if self.resources.interval_secs == 0 {
            return Err(invalid("resources.interval_secs", "must be at least 1"));
        }
        if self.query.ring_capacity == 0 {
            return Err(invalid("query.ring_capacity", "must be at least 1"));
        }
        if self.query.max_total_samples == 0 {
            return Err(invalid("query.max_total_samples", "must be at least 1"));
        }
        if self.monitor.max_samples == 0 {
            return Err(invalid("monitor.max_samples", "must be at least 1"));
        }
        if self.resources.memory_limit_bytes == Some(0) {
            return Err(invalid("resources.memory_limit_bytes", "must be positive when set"));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = format!("{}:{}", self.server.host, self.server.port);
        raw.parse().map_err(|_| SettingsError::Address(raw))
    }
}

fn invalid(key: &'static str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn to_config(&self) -> CacheConfig {
        CacheConfig {
            namespace: self.namespace.clone(),
            default_ttl: self.default_ttl(),
        }
    }
}

impl MonitorSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn to_config(&self) -> MonitorConfig {
        MonitorConfig {
            slow_request_ms: self.slow_request_ms as f64,
            max_samples: self.max_samples,
            max_age: self.max_age(),
            health_max_error_rate: self.health_max_error_rate,
            health_max_avg_ms: self.health_max_avg_ms,
            health_window: Duration::from_secs(self.health_window_secs),
            default_window: Duration::from_secs(self.default_window_secs),
        }
    }
}

impl QuerySettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn to_config(&self) -> QueryConfig {
        QueryConfig {
            slow_query_ms: self.slow_query_ms,
            ring_capacity: self.ring_capacity,
            suggestion_min_avg_ms: self.suggestion_min_avg_ms as f64,
            max_total_samples: self.max_total_samples,
        }
    }
}

impl ResourceSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn to_config(&self) -> ResourceConfig {
        ResourceConfig {
            memory_threshold_percent: self.memory_threshold_percent,
            load_threshold_percent: self.load_threshold_percent,
            alert_capacity: self.alert_capacity,
            memory_limit_bytes: self.memory_limit_bytes,
        }
    }
}
