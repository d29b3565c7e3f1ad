//! libSQL-backed storage backend

use std::path::Path;

use libsql::params;

use super::KeyValueStore;
use crate::db::Database;
use crate::error::{Result, StorageError, StorageResult};
use crate::util::unix_millis_now;

/// Durable key-value storage in a local libSQL database file.
pub struct LibSqlStore {
    db: Database,
}

impl LibSqlStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    /// Open a throwaway in-memory store.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }
}

impl KeyValueStore for LibSqlStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut rows = self
            .db
            .connection()
            .query("SELECT value FROM local_storage WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.db
            .connection()
            .execute(
                "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, unix_millis_now()],
            )
            .await
            .map_err(|error| map_write_error(key, value, &error))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.db
            .connection()
            .execute("DELETE FROM local_storage WHERE key = ?", [key])
            .await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix_len = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT key FROM local_storage WHERE substr(key, 1, ?1) = ?2 ORDER BY key",
                params![prefix_len, prefix],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }
}

fn map_write_error(key: &str, value: &str, error: &libsql::Error) -> StorageError {
    let message = error.to_string();
    if message.to_ascii_lowercase().contains("database or disk is full") {
        StorageError::QuotaExceeded {
            key: key.to_string(),
            requested: key.len() + value.len(),
            available: 0,
        }
    } else {
        StorageError::Unavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn set_get_remove() {
        let store = LibSqlStore::open_in_memory().await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prefix_scan_treats_underscore_literally() {
        let store = LibSqlStore::open_in_memory().await.unwrap();
        store.set("offline_note_1", "a").await.unwrap();
        store.set("offlineXnoteX2", "b").await.unwrap();
        store.set("offline_note_temp_5", "c").await.unwrap();

        let keys = store.keys_with_prefix("offline_note_").await.unwrap();
        assert_eq!(keys, vec!["offline_note_1", "offline_note_temp_5"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn values_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("bytenote.db");

        {
            let store = LibSqlStore::open(&path).await.unwrap();
            store.set("sync_queue", "[]").await.unwrap();
        }

        let reopened = LibSqlStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("sync_queue").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
