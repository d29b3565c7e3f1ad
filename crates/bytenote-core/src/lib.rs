//! bytenote-core - Offline sync layer for ByteNote
//!
//! This crate contains the local record store, sync queue, connectivity
//! monitor, sync engine and draft autosave shared by ByteNote clients.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod draft;
pub mod error;
pub mod models;
pub mod queue;
pub mod records;
pub mod remote;
pub mod service;
pub mod storage;
pub mod sync;
pub mod util;

pub use config::ClientConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use error::{Error, Result, StorageError};
pub use models::{NoteFields, NoteKey, OfflineNote, SyncItem, SyncItemId, SyncKind, SyncReport};
pub use service::{DeleteOutcome, OfflineService, SaveOutcome};
