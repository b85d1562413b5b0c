//! Database connection and pool management for the Master CRUD service.
//!
//! Creates the SeaORM connection pool (Postgres in deployed profiles, SQLite
//! for local runs and tests), applies migrations and answers health probes.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::AppConfig;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {source}")]
    ConnectionFailed {
        #[from]
        source: sea_orm::DbErr,
    },
    #[error("Database connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },
    #[error("Invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Initializes a database connection pool with the given configuration.
///
/// Connection attempts are retried with exponential backoff. An in-memory
/// SQLite URL is pinned to a single long-lived connection, since every
/// connection would otherwise see its own empty database.
///
/// ```no_run
/// use master_crud::{config::AppConfig, db::init_pool};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = AppConfig::default();
///     let db = init_pool(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection> {
    if cfg.database_url.trim().is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "Database URL cannot be empty".to_string(),
        }
        .into());
    }

    connect_with_retry(connect_options(cfg), cfg.db_acquire_timeout_ms).await
}

const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(100);

fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(&cfg.database_url);
    opt.acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    if is_memory_url(&cfg.database_url) {
        // one shared connection, or every checkout sees an empty database
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(cfg.db_max_connections)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800));
    }
    opt
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

async fn connect_with_retry(opt: ConnectOptions, timeout_ms: u64) -> Result<DatabaseConnection> {
    let mut delay = FIRST_RETRY_DELAY;
    let mut last_error = None;

    for attempt in 1..=CONNECT_ATTEMPTS {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                log::info!("Connected to database on attempt {attempt}");
                return Ok(conn);
            }
            Err(err) if attempt < CONNECT_ATTEMPTS => {
                log::warn!(
                    "Database connection attempt {attempt} failed: {err}; retrying in {delay:?}"
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(err) => {
                log::error!(
                    "Giving up on database after {CONNECT_ATTEMPTS} attempts: {err}"
                );
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(source) => Err(DatabaseError::ConnectionFailed { source }.into()),
        None => Err(DatabaseError::ConnectionTimeout { timeout_ms }.into()),
    }
}

/// Applies every pending migration.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .context("Failed to apply database migrations")?;
    log::info!("Database migrations applied");
    Ok(())
}

/// Health check for the database connection: runs `SELECT 1`.
pub async fn health_check(db: &DatabaseConnection) -> Result<()> {
    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());

    db.query_one(stmt)
        .await
        .context("Database health check failed")?;

    Ok(())
}
