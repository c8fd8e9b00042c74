//! Bootstrap configuration loading
//!
//! Every value resolves in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 arrive together as [`Overrides`]: the binaries declare each flag with a
//! clap `env` fallback, so by the time a value reaches this module the two are merged.
//! The connection string has no compiled default; a missing one is a configuration fault.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the store connection string
pub const DATABASE_URL_ENV: &str = "DB_URL";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "SKYLANCE_CONFIG";

/// Booking pipeline artifact used when nothing else is configured
pub const DEFAULT_BOOKING_ARTIFACT: &str = "rf_pipeline.json";

/// Flight pipeline artifact used when nothing else is configured
pub const DEFAULT_FLIGHT_ARTIFACT: &str = "flight_no_show_pipeline.json";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Bootstrap configuration loaded from TOML file
///
/// Read once at startup. The process must restart to pick up changes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// sqlx connection string (e.g. `sqlite://skylance.db`)
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Serialized scorer artifact locations, one per pipeline
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub bookings: Option<PathBuf>,
    #[serde(default)]
    pub flights: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Locate and load the bootstrap config
    ///
    /// An explicit path (argument, then `SKYLANCE_CONFIG`) must exist. Without one, the
    /// platform locations are searched and a missing file simply yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::NotFound(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading config file: {}", path.display());
            return Self::from_file(&path);
        }

        for candidate in default_config_locations() {
            if candidate.exists() {
                info!("Loading config file: {}", candidate.display());
                return Self::from_file(&candidate);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

/// Platform config file locations, most specific first
///
/// `~/.config/skylance/config.toml` (or the platform equivalent), then
/// `/etc/skylance/config.toml` on Unix.
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("skylance").join("config.toml"));
    }
    if cfg!(unix) {
        locations.push(PathBuf::from("/etc/skylance/config.toml"));
    }
    locations
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub booking_artifact: Option<PathBuf>,
    pub flight_artifact: Option<PathBuf>,
}

/// Fully resolved bootstrap settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub booking_artifact: PathBuf,
    pub flight_artifact: PathBuf,
    pub log_level: String,
}

impl Settings {
    /// Merge overrides, TOML values and compiled defaults
    pub fn resolve(overrides: Overrides, toml: &TomlConfig) -> Result<Self> {
        let database_url = overrides
            .database_url
            .filter(|url| is_valid_value(url))
            .or_else(|| toml.database_url.clone().filter(|url| is_valid_value(url)))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Please set {} in your environment (or database_url in the config file)",
                    DATABASE_URL_ENV
                ))
            })?;

        Ok(Self {
            database_url,
            host: overrides
                .host
                .or_else(|| toml.server.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides
                .port
                .or(toml.server.port)
                .unwrap_or(DEFAULT_PORT),
            booking_artifact: overrides
                .booking_artifact
                .or_else(|| toml.artifacts.bookings.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOKING_ARTIFACT)),
            flight_artifact: overrides
                .flight_artifact
                .or_else(|| toml.artifacts.flights.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FLIGHT_ARTIFACT)),
            log_level: toml.logging.level.clone(),
        })
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}
