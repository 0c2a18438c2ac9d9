use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Runtime settings of the shop-floor server and CLI.
///
/// Every field except the connection essentials has a default, so a partial
/// `config/*.toml` or a handful of `APP__*` variables is enough.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// `development`, `production`, `test`...
    pub environment: String,

    #[validate(custom = "validate_log_level")]
    pub log_level: String,
    /// Emit one JSON object per log line
    pub log_json: bool,

    /// Apply pending migrations when the server starts
    pub auto_migrate: bool,

    /// Comma-separated list of allowed browser origins
    pub cors_allowed_origins: Option<String>,
    /// Opt-in to permissive CORS outside development
    pub cors_allow_any_origin: bool,

    #[validate(range(min = 1, max = 512))]
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub db_acquire_timeout_secs: u64,

    /// Done orders created more than this many days ago get archived
    #[validate(range(min = 1, max = 3650))]
    pub archive_retention_days: i64,

    /// History window used when the request gives no day count
    #[validate(range(min = 1, max = 366))]
    pub history_default_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://shopfloor.db?mode=rwc".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: DEFAULT_ENV.to_string(),
            log_level: "info".to_string(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: 16,
            db_min_connections: 1,
            db_connect_timeout_secs: 30,
            db_idle_timeout_secs: 600,
            db_acquire_timeout_secs: 8,
            archive_retention_days: 30,
            history_default_days: 30,
        }
    }
}

/// How the HTTP layer should answer cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    AllowList(Vec<String>),
    Permissive,
    /// Non-development environment without any CORS setting
    Unconfigured,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            ..Self::default()
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Explicit origins win; development or the opt-in flag fall back to
    /// permissive.
    pub fn cors_policy(&self) -> CorsPolicy {
        let origins: Vec<String> = self
            .cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if !origins.is_empty() {
            CorsPolicy::AllowList(origins)
        } else if self.is_development() || self.cors_allow_any_origin {
            CorsPolicy::Permissive
        } else {
            CorsPolicy::Unconfigured
        }
    }

    fn check_cross_field(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.cors_policy() == CorsPolicy::Unconfigured {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "set APP__CORS_ALLOWED_ORIGINS or opt in with APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Field ranges plus the checks spanning several fields
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.check_cross_field()
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Ok(());
    }
    let mut err = ValidationError::new("log_level");
    err.message = Some(format!("must be one of: {}", LOG_LEVELS.join(", ")).into());
    Err(err)
}

/// Installs the global subscriber; `RUST_LOG` overrides the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match env::var("RUST_LOG") {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::new(directive),
        _ => EnvFilter::new(format!("shopfloor_api={},tower_http=info", level)),
    };

    let installed = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    if installed.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Loads `config/default.toml`, then `config/{RUN_ENV}.toml`, then `APP__*`
/// variables, each layer overriding the previous one.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!(environment = %run_env, "Loading configuration");

    let app_config: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    if let Err(e) = app_config.validate_all() {
        error!(error = %e, "Rejected configuration");
        return Err(e.into());
    }

    Ok(app_config)
}
