//! Opening the panelsync record store.
//!
//! The sweep daemon and the check-queue worker write from separate tasks, so a
//! file-backed store runs in WAL mode with a busy timeout. Tests use a single
//! shared in-memory connection.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::DatabaseConfig;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Invalid database location {location}: {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to create database directory {}: {source}", dir.display())]
    Directory {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open record store: {0}")]
    Open(#[source] sqlx::Error),
}

/// Open the configured store, creating the file and its directory if needed.
pub async fn open_store(config: &DatabaseConfig) -> Result<SqlitePool, ConnectionError> {
    let location = config.url();
    if let Some(file) = store_file(&location) {
        ensure_parent_dir(file)?;
    }

    let options = SqliteConnectOptions::from_str(&location)
        .map_err(|source| ConnectionError::InvalidLocation {
            location: location.clone(),
            source,
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let max_connections = config.max_connections.max(1);
    debug!(%location, max_connections, "Opening record store");
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(ConnectionError::Open)
}

/// In-memory store on one long-lived connection, so every query sees the same database.
pub async fn open_in_memory() -> Result<SqlitePool, ConnectionError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|source| ConnectionError::InvalidLocation {
            location: "sqlite::memory:".to_string(),
            source,
        })?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(ConnectionError::Open)
}

/// Filesystem path behind a `sqlite:` location; `None` for in-memory stores.
fn store_file(location: &str) -> Option<&Path> {
    let rest = location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .unwrap_or(location);
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

fn ensure_parent_dir(file: &Path) -> Result<(), ConnectionError> {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            std::fs::create_dir_all(dir).map_err(|source| ConnectionError::Directory {
                dir: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
