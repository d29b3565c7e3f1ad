//! Editor draft autosave.
//!
//! Drafts are stored per editor route under `note-draft:<route>` and are
//! unrelated to the sync queue: they recover unsaved form state after a
//! reload, not failed network writes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::StorageError;
use crate::models::{normalize_tag_ids, Draft, NoteFields};
use crate::storage::{get_json, set_json, KeyValueStore};
use crate::util::unix_millis_now;

pub const DRAFT_KEY_PREFIX: &str = "note-draft:";

/// Storage key of the draft for `route`.
pub fn draft_key(route: &str) -> String {
    let route = route.trim();
    if route.is_empty() {
        format!("{DRAFT_KEY_PREFIX}default")
    } else {
        format!("{DRAFT_KEY_PREFIX}{route}")
    }
}

/// Editor fields after applying a saved draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredDraft {
    pub fields: NoteFields,
    /// At least one field came from the draft
    pub restored: bool,
}

/// Draft slot of one editor route
pub struct DraftStore<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(store: S, route: &str) -> Self {
        Self {
            store,
            key: draft_key(route),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write a snapshot of `fields`. Blank notes are not written.
    pub async fn save(&self, fields: &NoteFields) -> bool {
        if fields.is_blank() {
            return false;
        }
        let draft = Draft::snapshot(fields, unix_millis_now());
        match set_json(&self.store, &self.key, &draft).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Draft not saved: {error}");
                false
            }
        }
    }

    /// The saved draft; unreadable drafts count as absent.
    pub async fn load(&self) -> Option<Draft> {
        match get_json(&self.store, &self.key).await {
            Ok(draft) => draft,
            Err(error @ StorageError::Corrupt { .. }) => {
                tracing::warn!("Ignoring unreadable draft: {error}");
                None
            }
            Err(error) => {
                tracing::warn!("Failed to read draft: {error}");
                None
            }
        }
    }

    pub async fn purge(&self) {
        if let Err(error) = self.store.remove(&self.key).await {
            tracing::warn!("Failed to purge draft {}: {error}", self.key);
        }
    }

    /// Edit mode: overlay the saved draft on the server values.
    ///
    /// Title and content are taken when they differ from `initial`;
    /// category and tags whenever the draft carries them.
    pub async fn restore_for_edit(&self, initial: &NoteFields) -> RestoredDraft {
        let mut fields = initial.clone();
        let mut restored = false;
        let Some(draft) = self.load().await else {
            return RestoredDraft { fields, restored };
        };

        if let Some(title) = draft.title.filter(|title| *title != initial.title) {
            fields.title = title;
            restored = true;
        }
        if let Some(content) = draft.content.filter(|content| *content != initial.content) {
            fields.content = content;
            restored = true;
        }
        if let Some(category_id) = draft.category_id {
            restored |= category_id != initial.category_id;
            fields.category_id = category_id;
        }
        if let Some(tag_ids) = draft.tag_ids {
            let tag_ids = normalize_tag_ids(tag_ids);
            restored |= tag_ids != normalize_tag_ids(initial.tag_ids.iter().copied());
            fields.tag_ids = tag_ids;
        }
        RestoredDraft { fields, restored }
    }

    /// Create mode: drop any leftover draft and start from empty fields.
    pub async fn prepare_for_create(&self) -> NoteFields {
        self.purge().await;
        NoteFields::default()
    }
}

/// Drafts saved on this device, keyed by route.
pub async fn list_drafts<S: KeyValueStore>(store: &S) -> Vec<(String, Draft)> {
    let keys = match store.keys_with_prefix(DRAFT_KEY_PREFIX).await {
        Ok(keys) => keys,
        Err(error) => {
            tracing::warn!("Failed to list drafts: {error}");
            return Vec::new();
        }
    };
    let mut drafts = Vec::with_capacity(keys.len());
    for key in keys {
        match get_json::<_, Draft>(store, &key).await {
            Ok(Some(draft)) => {
                let route = key.trim_start_matches(DRAFT_KEY_PREFIX).to_string();
                drafts.push((route, draft));
            }
            Ok(None) => {}
            Err(error) => tracing::warn!("Skipping draft: {error}"),
        }
    }
    drafts
}

struct Pending {
    fields: NoteFields,
    task: JoinHandle<()>,
}

/// Debounced draft writer.
///
/// Each [`schedule`](Self::schedule) replaces the pending write, so only
/// the last change within `delay` reaches storage.
pub struct DraftAutosave<S> {
    drafts: Arc<DraftStore<S>>,
    delay: Duration,
    pending: Mutex<Option<Pending>>,
}

impl<S: KeyValueStore + 'static> DraftAutosave<S> {
    pub fn new(drafts: DraftStore<S>, delay: Duration) -> Self {
        Self {
            drafts: Arc::new(drafts),
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn drafts(&self) -> &DraftStore<S> {
        &self.drafts
    }

    /// Record a change; it is written once `delay` passes without another.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, fields: NoteFields) {
        let mut pending = self.lock_pending();
        if let Some(previous) = pending.take() {
            previous.task.abort();
        }
        if fields.is_blank() {
            return;
        }

        let drafts = Arc::clone(&self.drafts);
        let delay = self.delay;
        let snapshot = fields.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            drafts.save(&snapshot).await;
        });
        *pending = Some(Pending { fields, task });
    }

    /// Write the pending change now. Returns `false` when nothing was pending.
    pub async fn flush(&self) -> bool {
        let Some(pending) = self.lock_pending().take() else {
            return false;
        };
        if pending.task.is_finished() {
            return false;
        }
        pending.task.abort();
        self.drafts.save(&pending.fields).await
    }

    /// Drop the pending change without writing it.
    pub fn cancel(&self) {
        if let Some(pending) = self.lock_pending().take() {
            pending.task.abort();
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Drop for DraftAutosave<S> {
    fn drop(&mut self) {
        let pending = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = pending.take() {
            pending.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    const ROUTE: &str = "/notes/7/edit";

    fn fields(title: &str, content: &str) -> NoteFields {
        NoteFields::new(title, content)
    }

    #[test]
    fn draft_key_is_route_scoped() {
        assert_eq!(draft_key("/notes/new"), "note-draft:/notes/new");
        assert_eq!(draft_key("  "), "note-draft:default");
    }

    #[tokio::test]
    async fn create_mode_purges_leftover_draft() {
        let store = MemoryStore::new();
        let drafts = DraftStore::new(store.clone(), "/notes/new");
        assert!(drafts.save(&fields("half written", "from edit mode")).await);

        let form = drafts.prepare_for_create().await;

        assert_eq!(form, NoteFields::default());
        assert_eq!(drafts.load().await, None);
        assert_eq!(store.get("note-draft:/notes/new").await.unwrap(), None);
    }

    #[tokio::test]
    async fn edit_mode_overlays_changed_fields() {
        let drafts = DraftStore::new(MemoryStore::new(), ROUTE);
        let server = fields("Title", "server body").with_category(Some(3));
        drafts
            .save(&fields("Title", "draft body").with_tags([5, 2, 5]))
            .await;

        let restored = drafts.restore_for_edit(&server).await;

        assert!(restored.restored);
        assert_eq!(restored.fields.title, "Title");
        assert_eq!(restored.fields.content, "draft body");
        assert_eq!(restored.fields.category_id, None);
        assert_eq!(restored.fields.tag_ids, vec![2, 5]);
    }

    #[tokio::test]
    async fn edit_mode_without_changes_is_not_a_restore() {
        let drafts = DraftStore::new(MemoryStore::new(), ROUTE);
        let server = fields("Title", "body");
        drafts.save(&server).await;

        let restored = drafts.restore_for_edit(&server).await;

        assert!(!restored.restored);
        assert_eq!(restored.fields, server);
    }

    #[tokio::test]
    async fn partial_draft_only_touches_its_fields() {
        let store = MemoryStore::new();
        store
            .set(&draft_key(ROUTE), r#"{"content":"just content"}"#)
            .await
            .unwrap();
        let drafts = DraftStore::new(store, ROUTE);
        let server = fields("Title", "body").with_category(Some(1));

        let restored = drafts.restore_for_edit(&server).await;

        assert_eq!(
            restored.fields,
            fields("Title", "just content").with_category(Some(1))
        );
    }

    #[tokio::test]
    async fn corrupt_draft_is_ignored() {
        let store = MemoryStore::new();
        store.set(&draft_key(ROUTE), "{broken").await.unwrap();
        let drafts = DraftStore::new(store, ROUTE);

        assert_eq!(drafts.load().await, None);
        let server = fields("a", "b");
        assert_eq!(drafts.restore_for_edit(&server).await.fields, server);
    }

    #[tokio::test]
    async fn blank_fields_are_never_saved() {
        let drafts = DraftStore::new(MemoryStore::new(), ROUTE);
        assert!(!drafts.save(&fields("", "   ")).await);
        assert_eq!(drafts.load().await, None);
    }

    #[tokio::test]
    async fn list_drafts_reports_routes() {
        let store = MemoryStore::new();
        DraftStore::new(store.clone(), "/notes/new")
            .save(&fields("a", "b"))
            .await;
        DraftStore::new(store.clone(), ROUTE)
            .save(&fields("c", "d"))
            .await;

        let routes: Vec<String> = list_drafts(&store)
            .await
            .into_iter()
            .map(|(route, _)| route)
            .collect();
        assert_eq!(routes, vec!["/notes/7/edit".to_string(), "/notes/new".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_writes_after_quiet_period() {
        let store = MemoryStore::new();
        let autosave = DraftAutosave::new(
            DraftStore::new(store.clone(), ROUTE),
            Duration::from_millis(800),
        );

        autosave.schedule(fields("first", "x"));
        sleep(Duration::from_millis(500)).await;
        autosave.schedule(fields("second", "x"));
        sleep(Duration::from_millis(799)).await;
        assert_eq!(autosave.drafts().load().await, None);

        sleep(Duration::from_millis(2)).await;
        let draft = autosave.drafts().load().await.unwrap();
        assert_eq!(draft.title.as_deref(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_change_cancels_pending_write() {
        let autosave = DraftAutosave::new(
            DraftStore::new(MemoryStore::new(), ROUTE),
            Duration::from_millis(800),
        );

        autosave.schedule(fields("typed", "x"));
        autosave.schedule(fields("", ""));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(autosave.drafts().load().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately() {
        let autosave = DraftAutosave::new(
            DraftStore::new(MemoryStore::new(), ROUTE),
            Duration::from_millis(800),
        );

        autosave.schedule(fields("leaving", "page"));
        assert!(autosave.flush().await);
        assert_eq!(
            autosave.drafts().load().await.unwrap().title.as_deref(),
            Some("leaving")
        );
        assert!(!autosave.flush().await);
    }
}
