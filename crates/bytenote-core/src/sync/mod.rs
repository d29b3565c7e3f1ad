//! Sync engine and the background task that triggers it.

mod auto;
mod engine;

pub use auto::{spawn_auto_sync, AutoSync};
pub use engine::SyncEngine;
