//! Offline note model

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::util::unix_millis_now;

/// Prefix of client-generated note keys.
pub const TEMP_KEY_PREFIX: &str = "temp_";

/// Identifier of a locally stored note.
///
/// Notes the server knows about use their integer id. Notes created while
/// offline get a temporary `temp_<millis>` key until the first successful
/// sync hands out a real id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoteKey {
    /// Server-assigned identifier
    Remote(i64),
    /// Client-generated placeholder
    Temp(String),
}

impl NoteKey {
    /// Build a temporary key from a millisecond timestamp.
    #[must_use]
    pub fn temp(millis: i64) -> Self {
        Self::Temp(format!("{TEMP_KEY_PREFIX}{millis}"))
    }

    #[must_use]
    pub const fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// Server id, if this key refers to a persisted note.
    #[must_use]
    pub const fn remote_id(&self) -> Option<i64> {
        match self {
            Self::Remote(id) => Some(*id),
            Self::Temp(_) => None,
        }
    }
}

impl From<i64> for NoteKey {
    fn from(id: i64) -> Self {
        Self::Remote(id)
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "{id}"),
            Self::Temp(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid note key: {0:?}")]
pub struct ParseNoteKeyError(String);

impl FromStr for NoteKey {
    type Err = ParseNoteKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Self::Remote(id));
        }
        match trimmed.strip_prefix(TEMP_KEY_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(Self::Temp(trimmed.to_string())),
            _ => Err(ParseNoteKeyError(s.to_string())),
        }
    }
}

// Remote ids are JSON numbers and temporary keys are strings. Reading also
// accepts numeric strings, which older snapshots stored for remote ids.
impl Serialize for NoteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Remote(id) => serializer.serialize_i64(*id),
            Self::Temp(key) => serializer.serialize_str(key),
        }
    }
}

impl<'de> Deserialize<'de> for NoteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Number(i64),
            Text(String),
        }

        match RawKey::deserialize(deserializer)? {
            RawKey::Number(id) => Ok(Self::Remote(id)),
            RawKey::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Editable fields of a note, also the body sent to the notes API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFields {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl NoteFields {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category_id: None,
            tag_ids: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the tag ids; order and duplicates carry no meaning.
    #[must_use]
    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = i64>) -> Self {
        self.tag_ids = normalize_tag_ids(tag_ids);
        self
    }

    /// Both title and content are blank
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

/// Snapshot of a note's editable fields saved on this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineNote {
    /// Key under which the snapshot is stored, absent before the first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteKey>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    /// No server record exists yet
    #[serde(default)]
    pub is_new: bool,
    /// Last local modification (Unix ms), for ordering only
    #[serde(default)]
    pub timestamp: i64,
}

impl OfflineNote {
    /// Snapshot of a note that has never reached the server.
    #[must_use]
    pub fn new_draft(fields: NoteFields) -> Self {
        Self::from_fields(None, fields, true)
    }

    /// Snapshot of local edits to a server-known note.
    #[must_use]
    pub fn for_remote(id: i64, fields: NoteFields) -> Self {
        Self::from_fields(Some(NoteKey::Remote(id)), fields, false)
    }

    fn from_fields(id: Option<NoteKey>, fields: NoteFields, is_new: bool) -> Self {
        Self {
            id,
            title: fields.title,
            content: fields.content,
            category_id: fields.category_id,
            tag_ids: normalize_tag_ids(fields.tag_ids),
            is_new,
            timestamp: unix_millis_now(),
        }
    }

    /// The editable fields, as sent to the notes API.
    #[must_use]
    pub fn fields(&self) -> NoteFields {
        NoteFields {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id,
            tag_ids: self.tag_ids.clone(),
        }
    }

    /// Case-insensitive keyword match against title or content.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query) || self.content.to_lowercase().contains(&query)
    }
}

/// Sort and deduplicate tag ids.
pub fn normalize_tag_ids(tag_ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = tag_ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn note_key_parses_remote_and_temp() {
        assert_eq!("42".parse::<NoteKey>().unwrap(), NoteKey::Remote(42));
        assert_eq!(
            "temp_123".parse::<NoteKey>().unwrap(),
            NoteKey::Temp("temp_123".to_string())
        );
        assert!("temp_".parse::<NoteKey>().is_err());
        assert!("abc".parse::<NoteKey>().is_err());
    }

    #[test]
    fn note_key_display_matches_storage_form() {
        assert_eq!(NoteKey::Remote(7).to_string(), "7");
        assert_eq!(NoteKey::temp(99).to_string(), "temp_99");
    }

    #[test]
    fn note_key_json_uses_number_for_remote_ids() {
        assert_eq!(serde_json::to_string(&NoteKey::Remote(5)).unwrap(), "5");
        assert_eq!(
            serde_json::to_string(&NoteKey::temp(1)).unwrap(),
            "\"temp_1\""
        );
        let from_string: NoteKey = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(from_string, NoteKey::Remote(12));
    }

    #[test]
    fn offline_note_reads_original_field_names() {
        let raw = r#"{"id":"temp_5","title":"t","content":"c","categoryId":null,"tagIds":[3,1,3],"isNew":true,"timestamp":10}"#;
        let note: OfflineNote = serde_json::from_str(raw).unwrap();
        assert_eq!(note.id, Some(NoteKey::temp(5)));
        assert!(note.is_new);
        assert_eq!(note.category_id, None);
        assert_eq!(note.timestamp, 10);
    }

    #[test]
    fn with_tags_deduplicates() {
        let fields = NoteFields::new("a", "b").with_tags([3, 1, 3, 2]);
        assert_eq!(fields.tag_ids, vec![1, 2, 3]);
    }

    #[test]
    fn matches_query_is_case_insensitive() {
        let note = OfflineNote::new_draft(NoteFields::new("Rust Notes", "ownership rules"));
        assert!(note.matches_query("rust"));
        assert!(note.matches_query("OWNERSHIP"));
        assert!(!note.matches_query("python"));
        assert!(note.matches_query("  "));
    }
}
