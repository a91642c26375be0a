use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{EngineConfig, MEAN_EARTH_RADIUS_KM};
use crate::models::{EligibilityPolicy, FailurePolicy, LongitudeBounds};
use crate::output::OutputFormat;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_cache_lifetime")]
    pub lifetime_secs: u64,
    pub redis_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
            lifetime_secs: default_cache_lifetime(),
            redis_url: None,
        }
    }
}

impl CacheSettings {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

fn default_cache_dir() -> PathBuf { PathBuf::from("cache") }
fn default_cache_lifetime() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default)]
    pub eligibility: EligibilityPolicy,
    #[serde(default)]
    pub longitude_bounds: LongitudeBounds,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_earth_radius")]
    pub earth_radius_km: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            eligibility: EligibilityPolicy::default(),
            longitude_bounds: LongitudeBounds::default(),
            failure_policy: FailurePolicy::default(),
            earth_radius_km: default_earth_radius(),
        }
    }
}

impl MatchingSettings {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            eligibility: self.eligibility,
            longitude_bounds: self.longitude_bounds,
            failure_policy: self.failure_policy,
        }
    }
}

fn default_earth_radius() -> f64 { MEAN_EARTH_RADIUS_KM }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with COURIER_)
    /// 5. DATABASE_URL, if set
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., COURIER__CACHE__LIFETIME_SECS -> cache.lifetime_secs
            .add_source(environment());

        with_database_url(builder)?
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment());

        with_database_url(builder)?
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let radius = self.matching.earth_radius_km;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(ConfigError::Message(format!(
                "matching.earth_radius_km must be a positive number, got {}",
                radius
            )));
        }
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("COURIER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Let the conventional DATABASE_URL variable override the configured URL
fn with_database_url(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    match std::env::var("DATABASE_URL") {
        Ok(url) => builder.set_override("database.url", url),
        Err(_) => Ok(builder),
    }
}
