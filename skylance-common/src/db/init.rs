//! Store connection setup
//!
//! The store is owned by another application; this service never creates it.
//! A connection string pointing at a missing database file fails here, at startup.

use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Lock wait before SQLite reports `SQLITE_BUSY`
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Pool size; one connection per concurrent fetch or writeback transaction
pub const MAX_CONNECTIONS: u32 = 5;

/// Open a connection pool to the store and check it answers
pub async fn connect_store(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| Error::Config(format!("Invalid database URL '{}': {}", database_url, e)))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Connected to store: {}", database_url);
    Ok(pool)
}
