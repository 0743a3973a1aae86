use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use super::StoreError;

/// JSON values keyed by string. Each call touches a single key.
#[derive(Clone, Debug)]
pub struct KvStore {
    pool: SqlitePool,
}

impl KvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((value,)) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces the value at `key`.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_string(value)?;
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes `key`. Returns true if it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT key FROM kv WHERE substr(key, 1, length(?)) = ? ORDER BY key")
                .bind(prefix)
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::LocalStore;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, LocalStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, store) = setup().await;
        let kv = store.kv();

        kv.put("k", &vec![1, 2]).await.unwrap();
        kv.put("k", &vec![3]).await.unwrap();

        let value: Option<Vec<i32>> = kv.get("k").await.unwrap();
        assert_eq!(value, Some(vec![3]));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, store) = setup().await;
        let kv = store.kv();

        kv.put("k", "v").await.unwrap();
        assert!(kv.delete("k").await.unwrap());
        assert!(!kv.delete("k").await.unwrap());

        let value: Option<String> = kv.get("k").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_keys_with_prefix_ignores_like_wildcards() {
        let (_dir, store) = setup().await;
        let kv = store.kv();

        kv.put("draft:b.md", "b").await.unwrap();
        kv.put("draft:a.md", "a").await.unwrap();
        kv.put("draftXc.md", "c").await.unwrap();
        kv.put("credentials", "x").await.unwrap();

        let keys = kv.keys_with_prefix("draft:").await.unwrap();
        assert_eq!(keys, vec!["draft:a.md", "draft:b.md"]);

        let keys = kv.keys_with_prefix("draft_").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_serialization_error() {
        let (_dir, store) = setup().await;
        let kv = store.kv();

        kv.put("k", "text").await.unwrap();
        let err = kv.get::<Vec<i32>>("k").await.unwrap_err();
        assert!(matches!(err, crate::store::StoreError::Serialization(_)));
    }
}
