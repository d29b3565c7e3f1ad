//! Pending remote mutations and sync pass results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::note::{NoteKey, OfflineNote};
use crate::util::unix_millis_now;

/// Stable identity of a queued item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncItemId(Uuid);

impl SyncItemId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SyncItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Kind of remote mutation, fixed at enqueue time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Create,
    Update,
    Delete,
}

impl SyncKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote mutation waiting for connectivity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    pub id: SyncItemId,
    #[serde(rename = "type")]
    pub kind: SyncKind,
    /// Local key for `create`, target note for `update` and `delete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<NoteKey>,
    /// Payload for `create` and `update`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OfflineNote>,
    /// Enqueue time (Unix ms)
    pub timestamp: i64,
    /// Failed sync attempts so far
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncItem {
    fn new(kind: SyncKind, note_id: Option<NoteKey>, data: Option<OfflineNote>) -> Self {
        Self {
            id: SyncItemId::new(),
            kind,
            note_id,
            data,
            timestamp: unix_millis_now(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Create a note the server has not seen, stored locally under `key`.
    #[must_use]
    pub fn create(key: NoteKey, note: OfflineNote) -> Self {
        Self::new(SyncKind::Create, Some(key), Some(note))
    }

    #[must_use]
    pub fn update(target: NoteKey, note: OfflineNote) -> Self {
        Self::new(SyncKind::Update, Some(target), Some(note))
    }

    #[must_use]
    pub fn delete(target: NoteKey) -> Self {
        Self::new(SyncKind::Delete, Some(target), None)
    }

    /// The item targets a note that only exists under a temporary key.
    #[must_use]
    pub fn references_temp_key(&self) -> bool {
        self.note_id.as_ref().is_some_and(NoteKey::is_temp)
    }
}

/// Outcome counts of one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub success: usize,
    pub failed: usize,
    /// Items waiting on an earlier `create` for the same note
    pub deferred: usize,
    /// Items moved to the dead-letter list during this pass
    pub dead_lettered: usize,
    /// The pass did not run (offline, or another pass in progress)
    pub skipped: bool,
}

impl SyncReport {
    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            success: 0,
            failed: 0,
            deferred: 0,
            dead_lettered: 0,
            skipped: true,
        }
    }

    /// Anything was sent or changed in this pass.
    #[must_use]
    pub const fn touched_anything(&self) -> bool {
        self.success > 0 || self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteFields;

    #[test]
    fn sync_item_serializes_type_field() {
        let item = SyncItem::delete(NoteKey::Remote(4));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "delete");
        assert_eq!(json["noteId"], 4);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn sync_item_roundtrips_through_json() {
        let note = OfflineNote::new_draft(NoteFields::new("t", "c"));
        let item = SyncItem::create(NoteKey::temp(1), note);
        let raw = serde_json::to_string(&item).unwrap();
        let parsed: SyncItem = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn references_temp_key_only_for_temp_targets() {
        let note = OfflineNote::new_draft(NoteFields::new("t", "c"));
        assert!(SyncItem::update(NoteKey::temp(9), note.clone()).references_temp_key());
        assert!(!SyncItem::update(NoteKey::Remote(9), note).references_temp_key());
    }

    #[test]
    fn sync_item_ids_are_unique() {
        assert_ne!(SyncItemId::new(), SyncItemId::new());
    }
}
