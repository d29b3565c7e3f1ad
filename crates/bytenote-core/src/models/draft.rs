//! Editor draft model

use serde::{Deserialize, Serialize};

use super::note::NoteFields;

/// Autosaved editor state for one route.
///
/// Every field is optional when read back so partially written or older
/// drafts still restore whatever they do carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `Some(None)` records an explicit "uncategorized" choice
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "explicit_null"
    )]
    pub category_id: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<i64>,
}

impl Draft {
    /// Full snapshot of the editor fields at `saved_at`.
    #[must_use]
    pub fn snapshot(fields: &NoteFields, saved_at: i64) -> Self {
        Self {
            title: Some(fields.title.clone()),
            content: Some(fields.content.clone()),
            category_id: Some(fields.category_id),
            tag_ids: Some(fields.tag_ids.clone()),
            saved_at: Some(saved_at),
        }
    }
}

/// Distinguishes a missing `categoryId` from an explicit `null`.
mod explicit_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option, clippy::option_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Option<i64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    #[allow(clippy::option_option)]
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<i64>>, D::Error> {
        Option::<i64>::deserialize(deserializer).map(Some)
    }
}
