use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] bytenote_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note title or content provided")]
    EmptyNote,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Invalid note key: {0}")]
    InvalidNoteKey(String),
    #[error("Invalid queue item id: {0}")]
    InvalidItemId(String),
    #[error("Offline note not found: {0}")]
    NoteNotFound(String),
    #[error("No queued change at position {0}")]
    QueueIndexOutOfRange(usize),
    #[error("No dead-lettered change with id {0}")]
    DeadLetterNotFound(String),
    #[error("Refusing to drop unsynced changes without --yes")]
    ConfirmationRequired,
    #[error("The server rejected the change: {0}")]
    Rejected(String),
    #[error("The change could not be saved locally: {0}")]
    NotSaved(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No backend configured. Set api_base_url in config.json or BYTENOTE_API_URL to enable syncing."
    )]
    BackendNotConfigured,
}
