//! Data models for ByteNote

mod draft;
mod note;
mod sync_item;

pub use draft::Draft;
pub use note::{
    normalize_tag_ids, NoteFields, NoteKey, OfflineNote, ParseNoteKeyError, TEMP_KEY_PREFIX,
};
pub use sync_item::{SyncItem, SyncItemId, SyncKind, SyncReport};
