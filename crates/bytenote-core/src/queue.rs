//! Persisted sync queue and dead-letter list.
//!
//! The queue is a single JSON array under [`SYNC_QUEUE_KEY`], oldest item
//! first. Every mutation is a read-modify-write of that one value, so
//! callers must serialize access (see `OfflineService`).

use crate::error::{StorageError, StorageResult};
use crate::models::{NoteKey, SyncItem, SyncItemId, SyncKind};
use crate::storage::{get_json, set_json, KeyValueStore};
use crate::util::unix_millis_now;

/// Storage key of the pending queue
pub const SYNC_QUEUE_KEY: &str = "sync_queue";

/// Storage key of items that exhausted their retries
pub const DEAD_LETTER_KEY: &str = "sync_dead_letter";

/// Sync queue over a key-value store
pub struct SyncQueue<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> SyncQueue<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current queue snapshot, oldest first.
    pub async fn items(&self) -> StorageResult<Vec<SyncItem>> {
        Ok(get_json(self.store, SYNC_QUEUE_KEY).await?.unwrap_or_default())
    }

    /// Append an item to the end of the queue.
    pub async fn push(&self, item: SyncItem) -> StorageResult<()> {
        let mut items = self.load_for_write(SYNC_QUEUE_KEY).await?;
        items.push(item);
        set_json(self.store, SYNC_QUEUE_KEY, &items).await
    }

    /// Remove the item at `index` of the current snapshot.
    ///
    /// Out-of-range indexes leave the queue untouched and return `None`.
    pub async fn remove_at(&self, index: usize) -> StorageResult<Option<SyncItem>> {
        let mut items = self.items().await?;
        if index >= items.len() {
            return Ok(None);
        }
        let removed = items.remove(index);
        set_json(self.store, SYNC_QUEUE_KEY, &items).await?;
        Ok(Some(removed))
    }

    /// Remove an item by identity, wherever it currently sits.
    pub async fn remove_by_id(&self, id: SyncItemId) -> StorageResult<Option<SyncItem>> {
        let mut items = self.items().await?;
        let Some(position) = items.iter().position(|item| item.id == id) else {
            return Ok(None);
        };
        let removed = items.remove(position);
        set_json(self.store, SYNC_QUEUE_KEY, &items).await?;
        Ok(Some(removed))
    }

    /// Overwrite the stored copy of `item` (matched by id).
    ///
    /// Returns `false` when the item is no longer queued.
    pub async fn replace(&self, item: &SyncItem) -> StorageResult<bool> {
        let mut items = self.items().await?;
        let Some(slot) = items.iter_mut().find(|queued| queued.id == item.id) else {
            return Ok(false);
        };
        slot.clone_from(item);
        set_json(self.store, SYNC_QUEUE_KEY, &items).await?;
        Ok(true)
    }

    /// Point queued items at `new` instead of the temporary key `old`.
    ///
    /// Returns the number of rewritten items.
    pub async fn retarget(&self, old: &NoteKey, new: &NoteKey) -> StorageResult<usize> {
        let mut items = self.items().await?;
        let mut rewritten = 0;
        for item in &mut items {
            if item.note_id.as_ref() != Some(old) {
                continue;
            }
            item.note_id = Some(new.clone());
            if let Some(data) = item.data.as_mut() {
                data.id = Some(new.clone());
                data.is_new = false;
            }
            rewritten += 1;
        }
        if rewritten > 0 {
            set_json(self.store, SYNC_QUEUE_KEY, &items).await?;
        }
        Ok(rewritten)
    }

    /// Drop every pending item.
    pub async fn clear(&self) -> StorageResult<()> {
        self.store.remove(SYNC_QUEUE_KEY).await
    }

    /// Items parked after exhausting their retries, oldest first.
    pub async fn dead_letters(&self) -> StorageResult<Vec<SyncItem>> {
        Ok(get_json(self.store, DEAD_LETTER_KEY).await?.unwrap_or_default())
    }

    pub async fn push_dead_letter(&self, item: SyncItem) -> StorageResult<()> {
        let mut items = self.load_for_write(DEAD_LETTER_KEY).await?;
        items.push(item);
        set_json(self.store, DEAD_LETTER_KEY, &items).await
    }

    /// Park the queued updates and deletes of a note whose `create` was
    /// dead-lettered. They can never be sent while the note only has the
    /// temporary key `local`.
    ///
    /// Returns the number of moved items.
    pub async fn dead_letter_dependents(&self, local: &NoteKey, reason: &str) -> StorageResult<usize> {
        let (orphans, kept): (Vec<SyncItem>, Vec<SyncItem>) =
            self.items().await?.into_iter().partition(|item| {
                item.kind != SyncKind::Create && item.note_id.as_ref() == Some(local)
            });
        if orphans.is_empty() {
            return Ok(0);
        }
        set_json(self.store, SYNC_QUEUE_KEY, &kept).await?;

        let mut dead = self.load_for_write(DEAD_LETTER_KEY).await?;
        let moved = orphans.len();
        dead.extend(orphans.into_iter().map(|mut item| {
            item.last_error = Some(reason.to_string());
            item
        }));
        set_json(self.store, DEAD_LETTER_KEY, &dead).await?;
        Ok(moved)
    }

    /// Move a dead-lettered item back to the tail of the queue with a
    /// fresh retry budget.
    ///
    /// Requeueing a `create` also brings back the parked items of the same
    /// note, in their original order.
    pub async fn requeue_dead_letter(&self, id: SyncItemId) -> StorageResult<bool> {
        let mut dead = self.dead_letters().await?;
        let Some(position) = dead.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        let item = dead.remove(position);
        let dependents: Vec<SyncItem> = match (&item.kind, &item.note_id) {
            (SyncKind::Create, Some(local)) if local.is_temp() => {
                let (dependents, rest): (Vec<SyncItem>, Vec<SyncItem>) =
                    dead.into_iter().partition(|parked| {
                        parked.kind != SyncKind::Create && parked.note_id.as_ref() == Some(local)
                    });
                dead = rest;
                dependents
            }
            _ => Vec::new(),
        };

        let mut items = self.load_for_write(SYNC_QUEUE_KEY).await?;
        items.extend(std::iter::once(item).chain(dependents).map(|mut item| {
            item.attempts = 0;
            item.last_error = None;
            item
        }));
        set_json(self.store, SYNC_QUEUE_KEY, &items).await?;
        set_json(self.store, DEAD_LETTER_KEY, &dead).await?;
        Ok(true)
    }

    pub async fn clear_dead_letters(&self) -> StorageResult<()> {
        self.store.remove(DEAD_LETTER_KEY).await
    }

    /// Load a list before appending to it.
    ///
    /// A corrupt value is copied aside to `<key>.corrupt-<millis>` and the
    /// list starts over, so new items are never dropped because of it.
    async fn load_for_write(&self, key: &str) -> StorageResult<Vec<SyncItem>> {
        match get_json(self.store, key).await {
            Ok(items) => Ok(items.unwrap_or_default()),
            Err(error @ StorageError::Corrupt { .. }) => {
                let backup_key = format!("{key}.corrupt-{}", unix_millis_now());
                if let Some(raw) = self.store.get(key).await? {
                    self.store.set(&backup_key, &raw).await?;
                }
                tracing::warn!("{error}; moved the old value to {backup_key} and starting over");
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }
}
