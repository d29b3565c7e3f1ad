//! Local key-value storage.
//!
//! Offline notes, the sync queue and editor drafts all persist as JSON
//! strings in a flat string-keyed mapping. [`MemoryStore`] keeps that
//! mapping in process (clones share it, like tabs of one origin share
//! browser storage); [`LibSqlStore`] keeps it in a local libSQL file.

mod libsql_store;
mod memory;

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StorageError, StorageResult};

pub use libsql_store::LibSqlStore;
pub use memory::MemoryStore;

/// String-keyed, string-valued persistent mapping.
pub trait KeyValueStore: Send + Sync {
    /// Read a value; a missing key is `Ok(None)`.
    fn get(&self, key: &str) -> impl Future<Output = StorageResult<Option<String>>> + Send;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = StorageResult<()>> + Send;

    /// Delete a value; deleting a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = StorageResult<()>> + Send;

    /// All keys starting with `prefix`, in ascending order.
    fn keys_with_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = StorageResult<Vec<String>>> + Send;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> impl Future<Output = StorageResult<Option<String>>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).remove(key)
    }

    fn keys_with_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = StorageResult<Vec<String>>> + Send {
        (**self).keys_with_prefix(prefix)
    }
}

/// Read and decode a JSON value. Undecodable values are reported as corrupt.
pub async fn get_json<S, T>(store: &S, key: &str) -> StorageResult<Option<T>>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| StorageError::corrupt(key, &error))
}

/// Encode and write a JSON value.
pub async fn set_json<S, T>(store: &S, key: &str, value: &T) -> StorageResult<()>
where
    S: KeyValueStore,
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value)
        .map_err(|error| StorageError::Unavailable(format!("failed to encode {key}: {error}")))?;
    store.set(key, &raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NoteFields, OfflineNote};

    #[tokio::test]
    async fn get_json_reports_corrupt_values() {
        let store = MemoryStore::new();
        store.set("broken", "{not json").await.unwrap();

        let error = get_json::<_, OfflineNote>(&store, "broken")
            .await
            .unwrap_err();
        assert!(matches!(error, StorageError::Corrupt { ref key, .. } if key == "broken"));
    }

    #[tokio::test]
    async fn get_json_treats_missing_as_none() {
        let store = MemoryStore::new();
        let value = get_json::<_, OfflineNote>(&store, "missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn set_json_then_get_json() {
        let store = MemoryStore::new();
        let note = OfflineNote::new_draft(NoteFields::new("title", "body"));
        set_json(&store, "note", &note).await.unwrap();

        let loaded: Option<OfflineNote> = get_json(&store, "note").await.unwrap();
        assert_eq!(loaded, Some(note));
    }
}
