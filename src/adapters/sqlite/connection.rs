//! Opens the SQLite pool described by a [`DatabaseConfig`].

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create database directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Open a file-backed pool, creating the file and its directory if needed.
///
/// Cascade units write concurrently, so the database runs in WAL mode and a
/// writer waits up to `busy_timeout_ms` for the lock.
pub async fn open_pool(config: &DatabaseConfig) -> Result<SqlitePool, ConnectionError> {
    let path = config.file_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConnectionError::Directory {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(config.acquire_timeout())
        .connect_with(options)
        .await
        .map_err(|source| ConnectionError::Open {
            path: path.display().to_string(),
            source,
        })
}

/// A private in-memory database on a single connection that is never
/// recycled, so the data lives exactly as long as the pool.
pub async fn open_in_memory() -> Result<SqlitePool, ConnectionError> {
    let open_failed = |source| ConnectionError::Open {
        path: ":memory:".to_string(),
        source,
    };
    let options = SqliteConnectOptions::from_str(":memory:")
        .map_err(open_failed)?
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(open_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn foreign_keys_on(pool: &SqlitePool) -> bool {
        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(pool).await.unwrap();
        enabled == 1
    }

    #[tokio::test]
    async fn test_in_memory_pools_are_isolated() {
        let first = open_in_memory().await.unwrap();
        let second = open_in_memory().await.unwrap();
        assert!(foreign_keys_on(&first).await);

        sqlx::query("CREATE TABLE scratch (id INTEGER)").execute(&first).await.unwrap();
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE name = 'scratch'")
                .fetch_optional(&second)
                .await
                .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_open_pool_accepts_url_and_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("cascade.db");
        let config = DatabaseConfig {
            path: format!("sqlite:{}", db_path.display()),
            max_connections: 2,
            busy_timeout_ms: 500,
            ..DatabaseConfig::default()
        };
        assert_eq!(config.file_path(), db_path);

        let pool = open_pool(&config).await.unwrap();
        assert!(foreign_keys_on(&pool).await);
        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(&pool).await.unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(db_path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_open_pool_reports_unusable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = DatabaseConfig {
            path: blocker.join("cascade.db").display().to_string(),
            ..DatabaseConfig::default()
        };

        let err = open_pool(&config).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Directory { .. }));
    }
}
