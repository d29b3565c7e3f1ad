//! Network reachability tracking.

use std::sync::Arc;

use tokio::sync::watch;

/// Current network reachability.
///
/// `true` is advisory only: a remote call made right after can still fail.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Holds the latest reachability flag and broadcasts transitions.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish the latest reachability. Repeating the current value does
    /// not wake subscribers.
    ///
    /// Returns `true` when this call changed the state.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receiver that observes every online/offline transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }
}

impl<C: Connectivity + ?Sized> Connectivity for Arc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}
