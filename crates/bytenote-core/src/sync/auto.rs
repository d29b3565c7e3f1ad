//! Automatic sync on reconnect.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::remote::NotesApi;
use crate::service::OfflineService;
use crate::storage::KeyValueStore;

/// Handle of a running auto-sync task.
///
/// Dropping the handle also stops the task, after any pass in flight.
pub struct AutoSync {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AutoSync {
    /// Ask the task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(error) = (&mut self.task).await {
            tracing::warn!("Auto-sync task ended abnormally: {error}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run a sync pass now if there is pending work and we are online, then
/// again on every offline to online transition of `monitor`.
///
/// The task runs until the returned handle is stopped or dropped.
pub fn spawn_auto_sync<S, A, C>(
    service: OfflineService<S, A, C>,
    monitor: &ConnectivityMonitor,
) -> AutoSync
where
    S: KeyValueStore + 'static,
    A: NotesApi + 'static,
    C: Connectivity + Clone + 'static,
{
    let mut receiver = monitor.subscribe();
    let (shutdown, mut stop) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let online = *receiver.borrow_and_update();
        if online && service.pending_count().await > 0 {
            service.sync_offline_changes().await;
        }

        loop {
            tokio::select! {
                _ = &mut stop => break,
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *receiver.borrow_and_update();
                    if online {
                        service.sync_offline_changes().await;
                    }
                }
            }
        }
        tracing::debug!("Auto-sync stopped");
    });
    AutoSync {
        shutdown: Some(shutdown),
        task,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{NoteFields, NoteKey, OfflineNote, SyncItem};
    use crate::service::testing::FakeApi;
    use crate::storage::MemoryStore;

    async fn wait_for_empty_queue<C: Connectivity + Clone>(
        service: &OfflineService<MemoryStore, FakeApi, C>,
    ) {
        for _ in 0..100 {
            if service.pending_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue was not drained");
    }

    fn update(id: i64) -> SyncItem {
        SyncItem::update(
            NoteKey::Remote(id),
            OfflineNote::for_remote(id, NoteFields::new("t", "c")),
        )
    }

    #[tokio::test]
    async fn syncs_pending_work_at_start_when_online() {
        let monitor = ConnectivityMonitor::new(true);
        let api = FakeApi::default();
        let service = OfflineService::new(MemoryStore::new(), api.clone(), monitor.clone());
        service.add_to_sync_queue(update(1)).await;

        let auto_sync = spawn_auto_sync(service.clone(), &monitor);
        wait_for_empty_queue(&service).await;
        assert_eq!(api.calls(), vec!["update 1".to_string()]);
        auto_sync.stop().await;
    }

    #[tokio::test]
    async fn syncs_on_reconnect() {
        let monitor = ConnectivityMonitor::new(false);
        let api = FakeApi::default();
        let service = OfflineService::new(MemoryStore::new(), api.clone(), monitor.clone());
        service.add_to_sync_queue(update(1)).await;

        let auto_sync = spawn_auto_sync(service.clone(), &monitor);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(service.pending_count().await, 1);
        assert!(api.calls().is_empty());

        monitor.set_online(true);
        wait_for_empty_queue(&service).await;
        assert_eq!(api.calls(), vec!["update 1".to_string()]);
        auto_sync.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_the_task_while_the_service_lives_on() {
        let monitor = ConnectivityMonitor::new(false);
        let service = OfflineService::new(MemoryStore::new(), FakeApi::default(), monitor.clone());

        let auto_sync = spawn_auto_sync(service.clone(), &monitor);
        assert!(!auto_sync.is_finished());

        tokio::time::timeout(Duration::from_secs(1), auto_sync.stop())
            .await
            .expect("auto-sync did not stop");
        assert!(!service.is_syncing());
    }

    #[tokio::test]
    async fn dropped_handle_stops_syncing_on_reconnect() {
        let monitor = ConnectivityMonitor::new(false);
        let api = FakeApi::default();
        let service = OfflineService::new(MemoryStore::new(), api.clone(), monitor.clone());
        service.add_to_sync_queue(update(1)).await;

        drop(spawn_auto_sync(service.clone(), &monitor));
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.set_online(true);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(api.calls().is_empty());
        assert_eq!(service.pending_count().await, 1);
    }
}
