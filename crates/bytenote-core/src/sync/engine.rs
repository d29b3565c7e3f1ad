//! Queue replay against the remote notes API.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::error::StorageResult;
use crate::models::{NoteKey, SyncItem, SyncItemId, SyncKind, SyncReport};
use crate::queue::SyncQueue;
use crate::records::RecordStore;
use crate::remote::{NotesApi, RemoteError, RemoteNote};
use crate::storage::KeyValueStore;

/// One pass over the sync queue.
///
/// Items run oldest first, one request at a time. `lock` guards every
/// queue and record read-modify-write and is released while a request is
/// in flight.
pub struct SyncEngine<'a, S, A> {
    store: &'a S,
    lock: &'a Mutex<()>,
    api: &'a A,
    max_attempts: u32,
}

enum Step {
    /// The item left the queue before we got to it
    Gone,
    Deferred,
    Malformed(&'static str),
    Ready(SyncItem),
}

enum Flow {
    Continue,
    /// The backend refused the session; later items would fail the same way
    Halt,
}

impl<'a, S: KeyValueStore, A: NotesApi> SyncEngine<'a, S, A> {
    pub const fn new(store: &'a S, lock: &'a Mutex<()>, api: &'a A, max_attempts: u32) -> Self {
        Self {
            store,
            lock,
            api,
            max_attempts,
        }
    }

    pub async fn run(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let snapshot = {
            let _guard = self.lock.lock().await;
            SyncQueue::new(self.store).items().await
        };
        let ids: Vec<SyncItemId> = match snapshot {
            Ok(items) => items.iter().map(|item| item.id).collect(),
            Err(error) => {
                tracing::warn!("Sync pass aborted, queue unreadable: {error}");
                return report;
            }
        };

        // Targets with an earlier unconfirmed item in this pass
        let mut blocked: HashSet<NoteKey> = HashSet::new();

        for id in ids {
            match self.process(id, &mut blocked, &mut report).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    tracing::warn!("Sync pass stopped, the backend refused the session");
                    break;
                }
                Err(error) => {
                    tracing::warn!("Sync item {id} left queued after storage error: {error}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn process(
        &self,
        id: SyncItemId,
        blocked: &mut HashSet<NoteKey>,
        report: &mut SyncReport,
    ) -> StorageResult<Flow> {
        let item = match self.prepare(id, blocked).await? {
            Step::Gone => return Ok(Flow::Continue),
            Step::Deferred => {
                report.deferred += 1;
                return Ok(Flow::Continue);
            }
            Step::Malformed(reason) => {
                let _guard = self.lock.lock().await;
                let queue = SyncQueue::new(self.store);
                if let Some(mut item) = queue.remove_by_id(id).await? {
                    tracing::warn!("Dead-lettering malformed sync item {id}: {reason}");
                    item.last_error = Some(reason.to_string());
                    report.failed += 1;
                    report.dead_lettered += self.bury(&queue, item).await?;
                }
                return Ok(Flow::Continue);
            }
            Step::Ready(item) => item,
        };

        tracing::debug!(
            "Syncing {} item {} (attempt {})",
            item.kind,
            item.id,
            item.attempts + 1
        );
        match self.send(&item).await {
            Ok(created) => {
                self.confirm(&item, created).await?;
                report.success += 1;
            }
            Err(error) if item.kind == SyncKind::Delete && error.is_not_found() => {
                tracing::debug!("Note for delete item {} is already gone", item.id);
                self.confirm(&item, None).await?;
                report.success += 1;
            }
            Err(error) => {
                if let Some(target) = item.note_id.clone() {
                    blocked.insert(target);
                }
                report.failed += 1;
                let halt = error.is_auth();
                report.dead_lettered += self.record_failure(item, &error).await?;
                if halt {
                    return Ok(Flow::Halt);
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Re-read the item under the lock: earlier creates in this pass may
    /// have retargeted it, and callers may have removed it meanwhile.
    async fn prepare(&self, id: SyncItemId, blocked: &mut HashSet<NoteKey>) -> StorageResult<Step> {
        let current = {
            let _guard = self.lock.lock().await;
            SyncQueue::new(self.store)
                .items()
                .await?
                .into_iter()
                .find(|item| item.id == id)
        };
        let Some(item) = current else {
            return Ok(Step::Gone);
        };

        match item.kind {
            SyncKind::Create | SyncKind::Update if item.data.is_none() => {
                return Ok(Step::Malformed("missing note payload"));
            }
            SyncKind::Update | SyncKind::Delete if item.note_id.is_none() => {
                return Ok(Step::Malformed("missing target note"));
            }
            _ => {}
        }

        if let Some(target) = &item.note_id {
            let waits_on_create = item.kind != SyncKind::Create && target.is_temp();
            if waits_on_create || blocked.contains(target) {
                tracing::debug!("Deferring {} item {} for note {target}", item.kind, item.id);
                blocked.insert(target.clone());
                return Ok(Step::Deferred);
            }
        }
        Ok(Step::Ready(item))
    }

    async fn send(&self, item: &SyncItem) -> Result<Option<RemoteNote>, RemoteError> {
        let payload = item.data.as_ref().map(|note| note.fields()).unwrap_or_default();
        let target = item.note_id.as_ref().and_then(NoteKey::remote_id);
        match (item.kind, target) {
            (SyncKind::Create, _) => self.api.create_note(&payload).await.map(Some),
            (SyncKind::Update, Some(id)) => self.api.update_note(id, &payload).await.map(|_| None),
            (SyncKind::Delete, Some(id)) => self.api.delete_note(id).await.map(|()| None),
            (SyncKind::Update | SyncKind::Delete, None) => Err(RemoteError::InvalidResponse(
                "target note has no server id".to_string(),
            )),
        }
    }

    /// Apply a confirmed item. Record migration, retargeting and queue
    /// removal happen under one lock acquisition.
    async fn confirm(&self, item: &SyncItem, created: Option<RemoteNote>) -> StorageResult<()> {
        let _guard = self.lock.lock().await;
        let queue = SyncQueue::new(self.store);
        let records = RecordStore::new(self.store);

        match (item.kind, &item.note_id) {
            (SyncKind::Create, local) => {
                if let (Some(local), Some(remote)) = (local, created) {
                    let remote_key = NoteKey::Remote(remote.id);
                    if records.migrate(local, remote.id).await?.is_none() {
                        if let Some(mut note) = item.data.clone() {
                            note.id = Some(remote_key.clone());
                            note.is_new = false;
                            records.save(note).await?;
                        }
                    }
                    let retargeted = queue.retarget(local, &remote_key).await?;
                    tracing::info!(
                        "Note {local} created remotely as {remote_key} ({retargeted} queued item(s) retargeted)"
                    );
                }
            }
            (SyncKind::Update, Some(target)) => records.mark_synced(target).await?,
            (SyncKind::Delete, Some(target)) => records.remove(target).await?,
            (SyncKind::Update | SyncKind::Delete, None) => {}
        }
        queue.remove_by_id(item.id).await?;
        Ok(())
    }

    /// Count a failed attempt. Returns the number of items moved to the
    /// dead-letter list.
    ///
    /// Auth failures keep the item without spending an attempt.
    async fn record_failure(&self, mut item: SyncItem, error: &RemoteError) -> StorageResult<usize> {
        let auth = error.is_auth();
        if !auth {
            item.attempts = item.attempts.saturating_add(1);
        }
        item.last_error = Some(error.to_string());

        let _guard = self.lock.lock().await;
        let queue = SyncQueue::new(self.store);
        if !auth && (error.is_permanent() || item.attempts >= self.max_attempts) {
            if queue.remove_by_id(item.id).await?.is_none() {
                return Ok(0);
            }
            tracing::warn!(
                "Dead-lettering {} item {} after {} attempt(s): {error}",
                item.kind,
                item.id,
                item.attempts
            );
            return self.bury(&queue, item).await;
        }

        tracing::warn!(
            "Sync of {} item {} failed (attempt {}/{}): {error}",
            item.kind,
            item.id,
            item.attempts,
            self.max_attempts
        );
        queue.replace(&item).await?;
        Ok(0)
    }

    /// Push an item already removed from the queue to the dead-letter list,
    /// taking the queued edits of a never-created note along with it.
    /// Caller holds the lock.
    async fn bury(&self, queue: &SyncQueue<'_, S>, item: SyncItem) -> StorageResult<usize> {
        let orphaned = match (item.kind, &item.note_id) {
            (SyncKind::Create, Some(local)) if local.is_temp() => Some(local.clone()),
            _ => None,
        };
        queue.push_dead_letter(item).await?;
        let Some(local) = orphaned else {
            return Ok(1);
        };
        let reason = format!("create of note {local} was dead-lettered");
        let moved = queue.dead_letter_dependents(&local, &reason).await?;
        if moved > 0 {
            tracing::warn!("Dead-lettered {moved} queued item(s) of note {local} with their create");
        }
        Ok(1 + moved)
    }
}
