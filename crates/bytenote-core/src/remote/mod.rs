//! Remote notes API consumed by the sync engine.

mod http;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::NoteFields;

pub use http::HttpNotesApi;

/// Note as returned by the server after a create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Failure of one remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No response: offline, DNS failure, connection reset, timeout
    #[error("Request failed: {0}")]
    Transport(String),
    /// The server answered with a non-success status
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    /// The server answered 2xx with a body we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Retrying cannot succeed without changing the request.
    ///
    /// Client errors are permanent, except auth failures (fixed by signing
    /// in again), request timeouts and rate limits.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                matches!(*status, 400..=499) && !matches!(*status, 401 | 403 | 408 | 429)
            }
            Self::Transport(_) | Self::InvalidResponse(_) => false,
        }
    }

    /// The session was refused; every other request would fail the same way.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Create, update and delete operations of the notes backend.
pub trait NotesApi: Send + Sync {
    fn create_note(
        &self,
        payload: &NoteFields,
    ) -> impl Future<Output = Result<RemoteNote, RemoteError>> + Send;

    fn update_note(
        &self,
        id: i64,
        payload: &NoteFields,
    ) -> impl Future<Output = Result<RemoteNote, RemoteError>> + Send;

    fn delete_note(&self, id: i64) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> RemoteError {
        RemoteError::Status {
            status,
            message: "x".to_string(),
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(status(400).is_permanent());
        assert!(status(404).is_permanent());
        assert!(!status(401).is_permanent());
        assert!(!status(403).is_permanent());
        assert!(!status(408).is_permanent());
        assert!(!status(429).is_permanent());
        assert!(!status(503).is_permanent());
        assert!(!RemoteError::Transport("reset".to_string()).is_permanent());
    }

    #[test]
    fn auth_and_not_found_are_recognized() {
        assert!(status(401).is_auth());
        assert!(status(403).is_auth());
        assert!(!status(400).is_auth());
        assert!(status(404).is_not_found());
        assert!(!RemoteError::Transport("reset".to_string()).is_not_found());
    }

    #[test]
    fn remote_note_ignores_extra_fields() {
        let raw = r#"{"id":42,"title":"t","content":"c","categoryId":null,"userId":1,"tags":[]}"#;
        let note: RemoteNote = serde_json::from_str(raw).unwrap();
        assert_eq!(note.id, 42);
        assert_eq!(note.category_id, None);
    }
}
