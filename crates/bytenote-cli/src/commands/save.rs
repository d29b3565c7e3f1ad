use std::sync::Arc;

use bytenote_core::draft::{DraftAutosave, DraftStore, RestoredDraft};
use bytenote_core::storage::{KeyValueStore, LibSqlStore};
use bytenote_core::{DeleteOutcome, NoteFields, NoteKey, OfflineNote, SaveOutcome};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::cli::GlobalArgs;
use crate::commands::common::{
    editor_route, normalize_content, open_session, CliService, Reachability,
};
use crate::error::CliError;

pub struct SaveArgs {
    pub id: Option<i64>,
    pub title: String,
    pub content: Vec<String>,
    pub category: Option<i64>,
    pub tags: Vec<i64>,
    pub resume_draft: bool,
    pub stdin: bool,
}

impl SaveArgs {
    pub fn fields(&self) -> NoteFields {
        self.apply_to(NoteFields::default())
    }

    /// Overlay the fields given on the command line onto `base`.
    /// Empty title, content and tags leave the base values alone.
    pub fn apply_to(&self, mut base: NoteFields) -> NoteFields {
        let title = self.title.trim();
        if !title.is_empty() {
            base.title = title.to_string();
        }
        let content = normalize_content(&self.content.join(" "));
        if !content.is_empty() {
            base.content = content;
        }
        if self.category.is_some() {
            base.category_id = self.category;
        }
        if !self.tags.is_empty() {
            base = base.with_tags(self.tags.iter().copied());
        }
        base
    }
}

/// Fields to save before any `--stdin` body is read.
///
/// Edit mode starts from the cached copy of the note, with its saved draft
/// applied under `--resume-draft`, then the command-line fields. Create
/// mode clears any leftover draft.
pub async fn initial_fields(
    args: &SaveArgs,
    service: &CliService,
    drafts: &DraftStore<Arc<LibSqlStore>>,
) -> RestoredDraft {
    let Some(id) = args.id else {
        drafts.prepare_for_create().await;
        return RestoredDraft {
            fields: args.fields(),
            restored: false,
        };
    };

    let cached = service
        .get_offline_note(&NoteKey::Remote(id))
        .await
        .as_ref()
        .map(OfflineNote::fields)
        .unwrap_or_default();
    let mut base = RestoredDraft {
        fields: cached,
        restored: false,
    };
    if args.resume_draft {
        base = drafts.restore_for_edit(&base.fields).await;
    }
    RestoredDraft {
        fields: args.apply_to(base.fields),
        restored: base.restored,
    }
}

/// Read the note body line by line, scheduling a draft autosave after each
/// line so an interrupted session can be resumed.
pub async fn read_content<R, S>(
    reader: R,
    base: &NoteFields,
    autosave: &DraftAutosave<S>,
) -> std::io::Result<String>
where
    R: AsyncBufRead + Unpin,
    S: KeyValueStore + 'static,
{
    let mut lines = reader.lines();
    let mut content = String::new();
    while let Some(line) = lines.next_line().await? {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&line);

        let mut snapshot = base.clone();
        snapshot.content.clone_from(&content);
        autosave.schedule(snapshot);
    }
    Ok(content)
}

pub async fn run_save(args: SaveArgs, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Probe).await?;
    let route = editor_route(args.id);
    let drafts = session.service.drafts(&route);

    let initial = initial_fields(&args, &session.service, &drafts).await;
    if initial.restored {
        println!("Draft restored");
    }
    let mut fields = initial.fields;

    if args.stdin {
        let autosave = session
            .service
            .draft_autosave(&route, session.config.draft_debounce());
        let content = read_content(BufReader::new(tokio::io::stdin()), &fields, &autosave).await?;
        autosave.cancel();
        fields.content = normalize_content(&content);
    }
    if fields.is_blank() {
        return Err(CliError::EmptyNote);
    }

    match session.service.save_note(fields.clone(), args.id).await {
        SaveOutcome::Saved(note) => {
            drafts.purge().await;
            println!("Saved note {}", note.id);
            Ok(())
        }
        SaveOutcome::QueuedOffline(key) => {
            drafts.purge().await;
            println!("Saved locally as {key}, will sync later");
            Ok(())
        }
        SaveOutcome::Rejected(message) => {
            drafts.save(&fields).await;
            Err(CliError::Rejected(message))
        }
        SaveOutcome::NotSaved(message) => {
            drafts.save(&fields).await;
            Err(CliError::NotSaved(message))
        }
    }
}

pub async fn run_delete(id: i64, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Probe).await?;

    match session.service.delete_note(id).await {
        DeleteOutcome::Deleted => {
            println!("Deleted note {id}");
            Ok(())
        }
        DeleteOutcome::QueuedOffline => {
            println!("Delete of note {id} queued, will sync later");
            Ok(())
        }
        DeleteOutcome::Rejected(message) => Err(CliError::Rejected(message)),
        DeleteOutcome::NotSaved(message) => Err(CliError::NotSaved(message)),
    }
}
