//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig:  listen address of the http api.
//!     - StoreConfig:   which store backend, and where the sqlite file lives.
//!     - LoggingConfig: log level and whether every reading is logged.
//!     - SensorsConfig: the fixed hardware-id list served by /api/sensors/ids.
//!     - QueryConfig:   default and maximum `limit` for the list endpoints.
//!
//! every section may be omitted; missing sections take their defaults.
//!
//! ==============================================================================

use crate::validate::LimitPolicy;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// env var naming an explicit config file
pub const CONFIG_ENV: &str = "HOST_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub sensors: SensorsConfig,
    pub queries: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("data").join("telemetry.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// log each accepted reading at info instead of debug
    pub show_sensor_data: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorsConfig {
    /// hardware ids of the deployed devices
    pub known_ids: Vec<String>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            known_ids: vec![
                "HELADERA-A001".to_string(),
                "HELADERA-A002".to_string(),
                "HELADERA-A003".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub recent_limit: usize,
    pub history_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { recent_limit: 50, history_limit: 200, max_limit: 1000 }
    }
}

impl QueryConfig {
    pub fn recent(&self) -> LimitPolicy {
        LimitPolicy { default: self.recent_limit, max: self.max_limit }
    }

    pub fn history(&self) -> LimitPolicy {
        LimitPolicy { default: self.history_limit, max: self.max_limit }
    }
}

/// where the effective configuration came from
///
/// logging is not up yet while the config loads (the level lives in it),
/// so the outcome is reported back and logged by the caller.
#[derive(Debug)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults {
        /// candidates that existed but could not be loaded
        rejected: Vec<(PathBuf, String)>,
    },
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load with default fallback
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let mut paths = Vec::new();
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from("config").join("host.toml"));
        paths.push(PathBuf::from("..").join("config").join("host.toml"));

        let mut rejected = Vec::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => return (config, ConfigOrigin::File(path)),
                Err(e) => rejected.push((path, e.to_string())),
            }
        }

        (Self::default(), ConfigOrigin::Defaults { rejected })
    }

    /// Log configuration summary
    pub fn log_summary(&self, origin: &ConfigOrigin) {
        match origin {
            ConfigOrigin::File(path) => log::info!("[CONFIG] Loaded from {}", path.display()),
            ConfigOrigin::Defaults { rejected } => {
                for (path, reason) in rejected {
                    log::warn!("[CONFIG] Failed to load {}: {}", path.display(), reason);
                }
                log::warn!("[CONFIG] No usable config file found - using defaults");
            }
        }
        log::info!("[CONFIG] Bind: {}", self.server.bind);
        log::info!("[CONFIG] Store: {:?} ({})", self.store.backend, self.store.path.display());
        log::info!("[CONFIG] Log Level: {}", self.logging.level);
        log::info!("[CONFIG] Known sensors: {}", self.sensors.known_ids.join(", "));
        log::info!(
            "[CONFIG] Limits: recent={} history={} max={}",
            self.queries.recent_limit,
            self.queries.history_limit,
            self.queries.max_limit
        );
    }
}
