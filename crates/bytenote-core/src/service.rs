//! Offline notes service.
//!
//! [`OfflineService`] is the single owner of the local record store and
//! the sync queue. Every read-modify-write of either goes through one
//! async lock, so concurrent callers (the editor, the auto-sync task, a
//! CLI command) never interleave their updates. Public operations do not
//! fail: storage problems are logged and degrade to empty results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::connectivity::Connectivity;
use crate::draft::{list_drafts, DraftAutosave, DraftStore};
use crate::error::{StorageError, StorageResult};
use crate::models::{
    normalize_tag_ids, Draft, NoteFields, NoteKey, OfflineNote, SyncItem, SyncItemId, SyncReport,
};
use crate::queue::SyncQueue;
use crate::records::RecordStore;
use crate::remote::{NotesApi, RemoteNote};
use crate::storage::KeyValueStore;
use crate::sync::SyncEngine;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Result of an explicit save from the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server accepted the note
    Saved(RemoteNote),
    /// Stored locally under the key, will sync later
    QueuedOffline(NoteKey),
    /// The server refused the note; nothing was queued
    Rejected(String),
    /// Neither the server nor local storage took the note
    NotSaved(String),
}

/// Result of deleting a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    QueuedOffline,
    Rejected(String),
    NotSaved(String),
}

pub struct OfflineService<S, A, C> {
    store: Arc<S>,
    lock: Arc<Mutex<()>>,
    api: Option<Arc<A>>,
    connectivity: C,
    syncing: Arc<AtomicBool>,
    max_attempts: u32,
}

impl<S, A, C: Clone> Clone for OfflineService<S, A, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            lock: Arc::clone(&self.lock),
            api: self.api.clone(),
            connectivity: self.connectivity.clone(),
            syncing: Arc::clone(&self.syncing),
            max_attempts: self.max_attempts,
        }
    }
}

/// Clears the in-progress flag when a pass ends, even if it is cancelled.
struct SyncRunning<'a>(&'a AtomicBool);

impl Drop for SyncRunning<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: KeyValueStore, A: NotesApi, C: Connectivity> OfflineService<S, A, C> {
    pub fn new(store: S, api: A, connectivity: C) -> Self {
        Self::build(store, Some(api), connectivity)
    }

    /// Service without a backend; every save is queued for later.
    pub fn local_only(store: S, connectivity: C) -> Self {
        Self::build(store, None, connectivity)
    }

    fn build(store: S, api: Option<A>, connectivity: C) -> Self {
        Self {
            store: Arc::new(store),
            lock: Arc::new(Mutex::new(())),
            api: api.map(Arc::new),
            connectivity,
            syncing: Arc::new(AtomicBool::new(false)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Failed attempts before an item is dead-lettered (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// A sync pass is currently running.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Draft store for an editor route, sharing this service's storage.
    pub fn drafts(&self, route: &str) -> DraftStore<Arc<S>> {
        DraftStore::new(Arc::clone(&self.store), route)
    }

    /// Debounced draft writer for an editor route.
    pub fn draft_autosave(&self, route: &str, delay: Duration) -> DraftAutosave<Arc<S>>
    where
        S: 'static,
    {
        DraftAutosave::new(self.drafts(route), delay)
    }

    /// Drafts saved on this device, keyed by editor route.
    pub async fn list_drafts(&self) -> Vec<(String, Draft)> {
        list_drafts(&*self.store).await
    }

    fn remote(&self) -> Option<&A> {
        if self.is_online() {
            self.api.as_deref()
        } else {
            None
        }
    }

    // Local record store

    pub async fn save_offline_note(&self, note: OfflineNote) -> Option<NoteKey> {
        let _guard = self.lock.lock().await;
        let result = RecordStore::new(&*self.store).save(note).await;
        degrade("save offline note", result.map(Some))
    }

    pub async fn get_offline_note(&self, key: &NoteKey) -> Option<OfflineNote> {
        let _guard = self.lock.lock().await;
        degrade("read offline note", RecordStore::new(&*self.store).get(key).await)
    }

    /// All offline notes, most recently modified first.
    pub async fn get_all_offline_notes(&self) -> Vec<OfflineNote> {
        let _guard = self.lock.lock().await;
        degrade("list offline notes", RecordStore::new(&*self.store).all().await)
    }

    pub async fn search_offline_notes(&self, query: &str) -> Vec<OfflineNote> {
        let _guard = self.lock.lock().await;
        degrade(
            "search offline notes",
            RecordStore::new(&*self.store).search(query).await,
        )
    }

    pub async fn remove_offline_note(&self, key: &NoteKey) -> bool {
        let _guard = self.lock.lock().await;
        let result = RecordStore::new(&*self.store).remove(key).await;
        degrade("remove offline note", result.map(|()| true))
    }

    // Sync queue

    pub async fn add_to_sync_queue(&self, item: SyncItem) -> bool {
        let _guard = self.lock.lock().await;
        let result = SyncQueue::new(&*self.store).push(item).await;
        degrade("enqueue sync item", result.map(|()| true))
    }

    /// Pending items, oldest first.
    pub async fn get_sync_queue(&self) -> Vec<SyncItem> {
        let _guard = self.lock.lock().await;
        degrade("read sync queue", SyncQueue::new(&*self.store).items().await)
    }

    pub async fn pending_count(&self) -> usize {
        self.get_sync_queue().await.len()
    }

    /// Remove the item at `index` of the current queue.
    pub async fn remove_sync_item(&self, index: usize) -> Option<SyncItem> {
        let _guard = self.lock.lock().await;
        degrade(
            "remove sync item",
            SyncQueue::new(&*self.store).remove_at(index).await,
        )
    }

    pub async fn clear_sync_queue(&self) {
        let _guard = self.lock.lock().await;
        degrade("clear sync queue", SyncQueue::new(&*self.store).clear().await);
    }

    pub async fn dead_letters(&self) -> Vec<SyncItem> {
        let _guard = self.lock.lock().await;
        degrade(
            "read dead letters",
            SyncQueue::new(&*self.store).dead_letters().await,
        )
    }

    /// Give a dead-lettered item a fresh retry budget at the end of the queue.
    pub async fn requeue_dead_letter(&self, id: SyncItemId) -> bool {
        let _guard = self.lock.lock().await;
        degrade(
            "requeue dead letter",
            SyncQueue::new(&*self.store).requeue_dead_letter(id).await,
        )
    }

    pub async fn clear_dead_letters(&self) {
        let _guard = self.lock.lock().await;
        degrade(
            "clear dead letters",
            SyncQueue::new(&*self.store).clear_dead_letters().await,
        );
    }

    // Sync

    /// Replay the queue against the backend.
    ///
    /// Skipped (zero counts) while offline or when another pass is running.
    pub async fn sync_offline_changes(&self) -> SyncReport {
        let Some(api) = self.remote() else {
            tracing::debug!("Skipping sync while offline");
            return SyncReport::skipped();
        };
        if self.syncing.swap(true, Ordering::AcqRel) {
            tracing::debug!("Skipping sync, a pass is already running");
            return SyncReport::skipped();
        }
        let _running = SyncRunning(&self.syncing);

        let report = SyncEngine::new(&*self.store, &self.lock, api, self.max_attempts)
            .run()
            .await;
        if report.touched_anything() || report.deferred > 0 {
            tracing::info!(
                "Sync finished: {} synced, {} failed, {} deferred, {} dead-lettered",
                report.success,
                report.failed,
                report.deferred,
                report.dead_lettered
            );
        }
        report
    }

    // Editor flows

    /// Save from the editor: straight to the server when online, otherwise
    /// (or when the server is unreachable) locally plus a queued mutation.
    ///
    /// Notes with queued changes always go through the queue so their
    /// mutations reach the server in order.
    pub async fn save_note(&self, fields: NoteFields, existing: Option<i64>) -> SaveOutcome {
        if fields.is_blank() {
            return SaveOutcome::Rejected("Title or content is required".to_string());
        }

        if let Some(api) = self.remote() {
            if !self.has_pending_for(existing).await {
                let result = match existing {
                    Some(id) => api.update_note(id, &fields).await,
                    None => api.create_note(&fields).await,
                };
                match result {
                    Ok(note) => {
                        self.refresh_cached(&note, &fields).await;
                        return SaveOutcome::Saved(note);
                    }
                    Err(error) if error.is_permanent() => {
                        return SaveOutcome::Rejected(error.to_string());
                    }
                    Err(error) => {
                        tracing::warn!("Online save failed, keeping the note for later sync: {error}");
                    }
                }
            }
        }

        let note = match existing {
            Some(id) => OfflineNote::for_remote(id, fields),
            None => OfflineNote::new_draft(fields),
        };
        let _guard = self.lock.lock().await;
        match self.store_and_enqueue(note).await {
            Ok(key) => {
                tracing::info!("Note {key} saved locally, will sync later");
                SaveOutcome::QueuedOffline(key)
            }
            Err(error) => {
                tracing::warn!("Failed to save note locally: {error}");
                SaveOutcome::NotSaved(error.to_string())
            }
        }
    }

    pub async fn delete_note(&self, id: i64) -> DeleteOutcome {
        let key = NoteKey::Remote(id);

        if let Some(api) = self.remote() {
            if !self.has_pending_for(Some(id)).await {
                match api.delete_note(id).await {
                    Ok(()) => {
                        self.remove_offline_note(&key).await;
                        return DeleteOutcome::Deleted;
                    }
                    Err(error) if error.is_not_found() => {
                        tracing::debug!("Note {id} was already deleted remotely");
                        self.remove_offline_note(&key).await;
                        return DeleteOutcome::Deleted;
                    }
                    Err(error) if error.is_permanent() => {
                        return DeleteOutcome::Rejected(error.to_string());
                    }
                    Err(error) => {
                        tracing::warn!("Online delete failed, queueing it: {error}");
                    }
                }
            }
        }

        let _guard = self.lock.lock().await;
        match SyncQueue::new(&*self.store).push(SyncItem::delete(key)).await {
            Ok(()) => DeleteOutcome::QueuedOffline,
            Err(error) => {
                tracing::warn!("Failed to queue delete of note {id}: {error}");
                DeleteOutcome::NotSaved(error.to_string())
            }
        }
    }

    /// Write the snapshot and its queue entry. Caller holds the lock.
    async fn store_and_enqueue(&self, mut note: OfflineNote) -> StorageResult<NoteKey> {
        let is_new = note.id.is_none();
        let key = RecordStore::new(&*self.store).save(note.clone()).await?;
        note.id = Some(key.clone());
        let item = if is_new {
            SyncItem::create(key.clone(), note)
        } else {
            SyncItem::update(key.clone(), note)
        };
        SyncQueue::new(&*self.store).push(item).await?;
        Ok(key)
    }

    async fn has_pending_for(&self, id: Option<i64>) -> bool {
        let Some(id) = id else {
            return false;
        };
        let target = NoteKey::Remote(id);
        self.get_sync_queue()
            .await
            .iter()
            .any(|item| item.note_id.as_ref() == Some(&target))
    }

    /// Keep an existing offline copy in line with what the server accepted.
    async fn refresh_cached(&self, note: &RemoteNote, fields: &NoteFields) {
        let _guard = self.lock.lock().await;
        let records = RecordStore::new(&*self.store);
        let key = NoteKey::Remote(note.id);
        let Ok(Some(mut cached)) = records.get(&key).await else {
            return;
        };
        cached.title.clone_from(&note.title);
        cached.content.clone_from(&note.content);
        cached.category_id = note.category_id;
        cached.tag_ids = normalize_tag_ids(fields.tag_ids.iter().copied());
        cached.is_new = false;
        degrade("refresh offline note", records.save(cached).await.map(|_| ()));
    }
}

fn degrade<T: Default>(operation: &str, result: Result<T, StorageError>) -> T {
    result.unwrap_or_else(|error| {
        tracing::warn!("Failed to {operation}: {error}");
        T::default()
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::models::NoteFields;
    use crate::remote::{NotesApi, RemoteError, RemoteNote};

    /// In-memory notes backend that records every call.
    #[derive(Clone, Default)]
    pub struct FakeApi {
        state: Arc<Mutex<FakeState>>,
        delay: Option<Duration>,
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<String>,
        failures: HashMap<String, RemoteError>,
        last_id: i64,
    }

    impl FakeApi {
        /// Ids handed out by `create_note` start at `id`.
        pub fn starting_at(id: i64) -> Self {
            let api = Self::default();
            api.state.lock().unwrap().last_id = id - 1;
            api
        }

        /// Every response waits `delay` first.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Make `call` (e.g. `"update 7"`) fail until cleared.
        pub fn fail(&self, call: &str, error: RemoteError) {
            self.state
                .lock()
                .unwrap()
                .failures
                .insert(call.to_string(), error);
        }

        pub fn recover(&self, call: &str) {
            self.state.lock().unwrap().failures.remove(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }

        async fn record(&self, call: String) -> Result<(), RemoteError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut state = self.state.lock().unwrap();
            let failure = state.failures.get(&call).cloned();
            state.calls.push(call);
            failure.map_or(Ok(()), Err)
        }
    }

    pub fn unavailable() -> RemoteError {
        RemoteError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }

    pub fn unauthorized() -> RemoteError {
        RemoteError::Status {
            status: 401,
            message: "Not signed in".to_string(),
        }
    }

    pub fn not_found() -> RemoteError {
        RemoteError::Status {
            status: 404,
            message: "Note not found".to_string(),
        }
    }

    pub fn bad_request() -> RemoteError {
        RemoteError::Status {
            status: 400,
            message: "Invalid category".to_string(),
        }
    }

    impl NotesApi for FakeApi {
        async fn create_note(&self, payload: &NoteFields) -> Result<RemoteNote, RemoteError> {
            self.record(format!("create {}", payload.title)).await?;
            let mut state = self.state.lock().unwrap();
            state.last_id += 1;
            Ok(RemoteNote {
                id: state.last_id,
                title: payload.title.clone(),
                content: payload.content.clone(),
                category_id: payload.category_id,
            })
        }

        async fn update_note(&self, id: i64, payload: &NoteFields) -> Result<RemoteNote, RemoteError> {
            self.record(format!("update {id}")).await?;
            Ok(RemoteNote {
                id,
                title: payload.title.clone(),
                content: payload.content.clone(),
                category_id: payload.category_id,
            })
        }

        async fn delete_note(&self, id: i64) -> Result<(), RemoteError> {
            self.record(format!("delete {id}")).await
        }
    }
}
