use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_RECONCILIATION_INTERVAL_SECS: u64 = 600;
const DEFAULT_PROVIDER_CALL_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PROVIDER_MAX_CONCURRENCY: usize = 8;
const DEFAULT_PROVIDER_BASE_URL: &str = "https://apis.tracker.delivery";

/// Delivery reconciliation worker settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReconciliationConfig {
    /// Run the periodic worker inside the server process
    #[serde(default = "default_true_bool")]
    pub enabled: bool,

    /// Seconds between runs
    #[serde(default = "default_reconciliation_interval")]
    #[validate(range(min = 1))]
    pub interval_secs: u64,

    /// Courier-tracking provider root, e.g. `https://apis.tracker.delivery`
    #[serde(default = "default_provider_base_url")]
    pub provider_base_url: String,

    /// Optional bearer token for the provider
    #[serde(default)]
    pub provider_api_key: Option<String>,

    /// Per-call timeout against the provider
    #[serde(default = "default_call_timeout")]
    #[validate(range(min = 1))]
    pub call_timeout_secs: u64,

    /// Upper bound on in-flight provider calls during one run
    #[serde(default = "default_max_concurrency")]
    #[validate(range(min = 1))]
    pub max_concurrency: usize,

    #[serde(default = "default_notification_title")]
    #[validate(length(min = 1))]
    pub notification_title: String,

    /// Body of the delivery notice; `{product}` is replaced by the product name
    #[serde(default = "default_notification_message")]
    #[validate(length(min = 1))]
    pub notification_message: String,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_RECONCILIATION_INTERVAL_SECS,
            provider_base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            provider_api_key: None,
            call_timeout_secs: DEFAULT_PROVIDER_CALL_TIMEOUT_SECS,
            max_concurrency: DEFAULT_PROVIDER_MAX_CONCURRENCY,
            notification_title: default_notification_title(),
            notification_message: default_notification_message(),
        }
    }
}

impl ReconciliationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB pool: connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB pool: idle timeout (seconds)
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Capacity of the in-process domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

impl AppConfig {
    /// Minimal configuration for the given database; everything else defaulted.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            reconciliation: ReconciliationConfig::default(),
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.reconciliation.enabled && self.reconciliation.provider_base_url.trim().is_empty() {
            let mut err = ValidationError::new("provider_base_url_required");
            err.message = Some(
                "Set APP__RECONCILIATION__PROVIDER_BASE_URL or disable the worker with APP__RECONCILIATION__ENABLED=false".into(),
            );
            errors.add("reconciliation", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    20
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    10
}
fn default_db_idle_timeout_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_reconciliation_interval() -> u64 {
    DEFAULT_RECONCILIATION_INTERVAL_SECS
}
fn default_call_timeout() -> u64 {
    DEFAULT_PROVIDER_CALL_TIMEOUT_SECS
}
fn default_max_concurrency() -> usize {
    DEFAULT_PROVIDER_MAX_CONCURRENCY
}
fn default_provider_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}

fn default_notification_title() -> String {
    "Delivery complete".to_string()
}

fn default_notification_message() -> String {
    "Your order of {product} has been delivered.".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("mall_fulfillment={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration from `./config`.
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let default_file = config_dir.join("default");
    let env_file = config_dir.join(&run_env);

    let config = Config::builder()
        .set_default("database_url", "sqlite://fulfillment.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_default(content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.toml"), content).unwrap();
        dir
    }

    #[test]
    fn defaults_fill_reconciliation_section() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.reconciliation.call_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.reconciliation.max_concurrency, 8);
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn loads_nested_reconciliation_from_file() {
        let dir = write_default(
            r#"
            database_url = "postgres://localhost/mall"
            environment = "staging"

            [reconciliation]
            interval_secs = 120
            provider_base_url = "http://tracker.local"
            max_concurrency = 4
            "#,
        );

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.database_url, "postgres://localhost/mall");
        assert_eq!(cfg.reconciliation.interval(), Duration::from_secs(120));
        assert_eq!(cfg.reconciliation.provider_base_url, "http://tracker.local");
        assert_eq!(cfg.reconciliation.max_concurrency, 4);
        assert_eq!(cfg.reconciliation.call_timeout_secs, 15);
    }

    #[test]
    fn rejects_zero_interval_and_concurrency() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.reconciliation.interval_secs = 0;
        cfg.reconciliation.max_concurrency = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn enabled_worker_needs_provider_url() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.reconciliation.provider_base_url = "  ".into();
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.reconciliation.enabled = false;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        assert!(validate_log_level("verbose").is_err());
        assert!(validate_log_level("DEBUG").is_ok());
    }
}
