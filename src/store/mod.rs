//! Local persistent state.
//!
//! A single SQLite database holds the signed-in credential and the draft
//! cache as JSON values in a key/value table. Open it once with
//! [`LocalStore::open`], hand clones of the handle to whoever needs it, and
//! call [`LocalStore::close`] on shutdown.

mod credentials;
mod drafts;
mod kv;

pub use credentials::{Credential, CredentialStore};
pub use drafts::{Draft, DraftCache};
pub use kv::KvStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ErrorKind;

/// Errors from the local store.
#[derive(Debug)]
pub enum StoreError {
    /// Query or connection failure
    Database(sqlx::Error),
    /// Schema migration failed
    Migration(sqlx::migrate::MigrateError),
    /// A stored value could not be encoded or decoded
    Serialization(serde_json::Error),
    /// The database directory could not be created
    CreateDir(PathBuf, std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Migration(e) => write!(f, "Database migration failed: {}", e),
            StoreError::Serialization(e) => write!(f, "Invalid stored value: {}", e),
            StoreError::CreateDir(path, e) => {
                write!(f, "Failed to create directory {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Migration(e) => Some(e),
            StoreError::Serialization(e) => Some(e),
            StoreError::CreateDir(_, e) => Some(e),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e)
    }
}

/// Handle to the local database.
#[derive(Clone, Debug)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Opens (creating if needed) the database at `path` and applies
    /// migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::CreateDir(parent.to_path_buf(), e))?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Opened local store at {}", path.display());
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("Closed local store");
    }

    pub fn kv(&self) -> KvStore {
        KvStore::new(self.pool.clone())
    }

    pub fn drafts(&self) -> DraftCache {
        DraftCache::new(self.kv())
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.kv())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_kv_table() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("loomsync.db");

        let store = LocalStore::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&store.pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(table_names, vec!["kv"]);

        store.close().await;
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("loomsync.db");

        let store = LocalStore::open(&db_path).await.unwrap();
        store.kv().put("greeting", &"hello").await.unwrap();
        store.close().await;

        let store = LocalStore::open(&db_path).await.unwrap();
        let value: Option<String> = store.kv().get("greeting").await.unwrap();
        assert_eq!(value.as_deref(), Some("hello"));
    }
}
