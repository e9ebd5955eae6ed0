//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! The API token can be overridden with the PLACES_API_TOKEN environment variable.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const TOKEN_ENV: &str = "PLACES_API_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), token: None, timeout_ms: default_api_timeout_ms() }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_api_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Minimum movement (meters) before a reading triggers downstream work
    #[serde(default = "default_significant_movement_m")]
    pub significant_movement_m: f64,
    #[serde(default = "default_true")]
    pub high_accuracy: bool,
    /// Timeout for the first fix
    #[serde(default = "default_initial_timeout_ms")]
    pub initial_timeout_ms: u64,
    /// Timeout for each update on the live watch
    #[serde(default = "default_update_timeout_ms")]
    pub update_timeout_ms: u64,
    #[serde(default)]
    pub maximum_age_ms: u64,
    /// Refuse to start tracking without an API token
    #[serde(default = "default_true")]
    pub require_token: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            significant_movement_m: default_significant_movement_m(),
            high_accuracy: true,
            initial_timeout_ms: default_initial_timeout_ms(),
            update_timeout_ms: default_update_timeout_ms(),
            maximum_age_ms: 0,
            require_token: true,
        }
    }
}

fn default_significant_movement_m() -> f64 {
    10.0
}

fn default_initial_timeout_ms() -> u64 {
    10_000
}

fn default_update_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NearbyConfig {
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,
    /// Keep the current listing when the backend answers with no places
    #[serde(default)]
    pub skip_empty_results: bool,
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self { radius_m: default_radius_m(), skip_empty_results: false }
    }
}

fn default_radius_m() -> u32 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub nearby: NearbyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api_base_url: String,
    api_token: Option<String>,
    api_timeout_ms: u64,
    significant_movement_m: f64,
    high_accuracy: bool,
    initial_timeout_ms: u64,
    update_timeout_ms: u64,
    maximum_age_ms: u64,
    require_token: bool,
    nearby_radius_m: u32,
    skip_empty_results: bool,
    metrics_interval_secs: u64,
    log_format: LogFormat,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let TomlConfig { api, tracking, nearby, metrics, logging } = toml_config;
        Self {
            api_base_url: api.base_url.trim_end_matches('/').to_string(),
            api_token: api.token.filter(|t| !t.is_empty()),
            api_timeout_ms: api.timeout_ms,
            significant_movement_m: tracking.significant_movement_m,
            high_accuracy: tracking.high_accuracy,
            initial_timeout_ms: tracking.initial_timeout_ms,
            update_timeout_ms: tracking.update_timeout_ms,
            maximum_age_ms: tracking.maximum_age_ms,
            require_token: tracking.require_token,
            nearby_radius_m: nearby.radius_m,
            skip_empty_results: nearby.skip_empty_results,
            metrics_interval_secs: metrics.interval_secs,
            log_format: logging.format,
            config_file,
        }
    }

    /// Determine config file path from an explicit argument or environment
    pub fn resolve_config_path(arg: Option<&str>) -> String {
        if let Some(path) = arg {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load from path, falling back to defaults if the file is missing or invalid
    ///
    /// The load error is handed back so it can be logged once logging is up.
    pub fn load_from_path(path: &str) -> (Self, Option<anyhow::Error>) {
        match Self::from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Apply environment overrides (currently only the API token)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.api_token = Some(token);
            }
        }
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn significant_movement_m(&self) -> f64 {
        self.significant_movement_m
    }

    pub fn high_accuracy(&self) -> bool {
        self.high_accuracy
    }

    pub fn initial_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_timeout_ms)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_millis(self.update_timeout_ms)
    }

    pub fn maximum_age(&self) -> Duration {
        Duration::from_millis(self.maximum_age_ms)
    }

    pub fn require_token(&self) -> bool {
        self.require_token
    }

    pub fn nearby_radius_m(&self) -> u32 {
        self.nearby_radius_m
    }

    pub fn skip_empty_results(&self) -> bool {
        self.skip_empty_results
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to toggle the login requirement
    #[cfg(test)]
    pub fn with_require_token(mut self, require: bool) -> Self {
        self.require_token = require;
        self
    }

    /// Builder method for tests to toggle empty-result suppression
    #[cfg(test)]
    pub fn with_skip_empty_results(mut self, skip: bool) -> Self {
        self.skip_empty_results = skip;
        self
    }
}
