//! Local record store for offline note snapshots.
//!
//! Each note is stored as JSON under `offline_note_<key>`, where the key is
//! the server id or a temporary `temp_<millis>` placeholder.

use crate::error::{StorageError, StorageResult};
use crate::models::{NoteKey, OfflineNote};
use crate::storage::{get_json, set_json, KeyValueStore};
use crate::util::unix_millis_now;

/// Namespace of offline note entries
pub const OFFLINE_PREFIX: &str = "offline_note_";

/// Storage key of the snapshot for `key`.
pub fn record_key(key: &NoteKey) -> String {
    format!("{OFFLINE_PREFIX}{key}")
}

/// Offline note snapshots over a key-value store
pub struct RecordStore<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> RecordStore<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Save a snapshot and return the key it was stored under.
    ///
    /// Notes without an id get a fresh temporary key. The stored copy has
    /// `id` set to that key and `timestamp` refreshed to now.
    pub async fn save(&self, mut note: OfflineNote) -> StorageResult<NoteKey> {
        let key = match note.id.clone() {
            Some(key) => key,
            None => self.allocate_temp_key().await?,
        };
        note.id = Some(key.clone());
        note.timestamp = unix_millis_now();
        set_json(self.store, &record_key(&key), &note).await?;
        Ok(key)
    }

    pub async fn get(&self, key: &NoteKey) -> StorageResult<Option<OfflineNote>> {
        get_json(self.store, &record_key(key)).await
    }

    /// All snapshots, most recently modified first. Corrupt entries are skipped.
    pub async fn all(&self) -> StorageResult<Vec<OfflineNote>> {
        let mut notes = Vec::new();
        for storage_key in self.store.keys_with_prefix(OFFLINE_PREFIX).await? {
            match get_json::<_, OfflineNote>(self.store, &storage_key).await {
                Ok(Some(note)) => notes.push(note),
                Ok(None) => {}
                Err(error @ StorageError::Corrupt { .. }) => {
                    tracing::warn!("Skipping offline note: {error}");
                }
                Err(error) => return Err(error),
            }
        }
        notes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(notes)
    }

    /// Snapshots whose title or content contains `query`, newest first.
    pub async fn search(&self, query: &str) -> StorageResult<Vec<OfflineNote>> {
        let mut notes = self.all().await?;
        notes.retain(|note| note.matches_query(query));
        Ok(notes)
    }

    pub async fn remove(&self, key: &NoteKey) -> StorageResult<()> {
        self.store.remove(&record_key(key)).await
    }

    /// Move a snapshot from a temporary key to its server id.
    ///
    /// Returns the migrated note, or `None` when nothing was stored under `old`.
    pub async fn migrate(&self, old: &NoteKey, remote_id: i64) -> StorageResult<Option<OfflineNote>> {
        let Some(mut note) = self.get(old).await? else {
            return Ok(None);
        };
        let new_key = NoteKey::Remote(remote_id);
        note.id = Some(new_key.clone());
        note.is_new = false;
        set_json(self.store, &record_key(&new_key), &note).await?;
        if *old != new_key {
            self.remove(old).await?;
        }
        Ok(Some(note))
    }

    /// Clear the `is_new` flag after the server confirmed the note.
    pub async fn mark_synced(&self, key: &NoteKey) -> StorageResult<()> {
        let Some(mut note) = self.get(key).await? else {
            return Ok(());
        };
        if note.is_new {
            note.is_new = false;
            set_json(self.store, &record_key(key), &note).await?;
        }
        Ok(())
    }

    async fn allocate_temp_key(&self) -> StorageResult<NoteKey> {
        let mut millis = unix_millis_now();
        loop {
            let key = NoteKey::temp(millis);
            if self.store.get(&record_key(&key)).await?.is_none() {
                return Ok(key);
            }
            millis += 1;
        }
    }
}
