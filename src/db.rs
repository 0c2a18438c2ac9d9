//! Connection pool setup and schema migrations

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, log::LevelFilter};

pub type DbPool = DatabaseConnection;

/// Pool tuning derived from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections.min(cfg.db_max_connections),
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

impl DbConfig {
    /// Backend name for logs, without credentials
    fn backend(&self) -> &str {
        self.url.split(':').next().unwrap_or("unknown")
    }
}

pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    let pool = Database::connect(options).await.map_err(|e| {
        error!(backend = config.backend(), error = %e, "Database connection failed");
        ServiceError::db_error(e)
    })?;

    gauge!("shopfloor.db.max_connections", config.max_connections as f64);
    info!(
        backend = config.backend(),
        max_connections = config.max_connections,
        "Database pool ready"
    );
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies every pending migration of [`crate::migrator::Migrator`].
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    crate::migrator::Migrator::up(pool, None).await.map_err(|e| {
        error!(error = %e, "Migrations failed");
        ServiceError::db_error(e)
    })?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Schema up to date");
    Ok(())
}

/// Round-trips a ping; used by the health endpoint.
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match pool.ping().await {
        Ok(()) => {
            gauge!("shopfloor.db.ping_ms", started.elapsed().as_millis() as f64);
            Ok(())
        }
        Err(e) => {
            counter!("shopfloor.db.ping_failures", 1);
            error!(error = %e, "Database ping failed");
            Err(ServiceError::db_error(e))
        }
    }
}

pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    pool.close().await.map_err(ServiceError::db_error)
}
