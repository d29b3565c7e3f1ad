use std::path::{Path, PathBuf};

use bytenote_core::remote::HttpNotesApi;
use bytenote_core::storage::LibSqlStore;
use bytenote_core::{
    ClientConfig, ConnectivityMonitor, NoteKey, OfflineNote, OfflineService, SyncItem,
};
use chrono::Utc;

use crate::cli::GlobalArgs;
use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "bytenote.db";

pub type CliService = OfflineService<LibSqlStore, HttpNotesApi, ConnectivityMonitor>;

/// Everything a command needs after config and storage are resolved.
pub struct Session {
    pub config: ClientConfig,
    pub service: CliService,
    pub monitor: ConnectivityMonitor,
    pub api: Option<HttpNotesApi>,
}

/// Whether a command needs to know if the backend is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reachability {
    /// Probe the backend once before running
    Probe,
    /// Local-only command; assume offline
    Skip,
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("bytenote").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("bytenote").join(DB_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<PathBuf, CliError> {
    cli_path.map_or_else(default_config_path, |path| Ok(path.to_path_buf()))
}

/// `--db-path`, then the configured path, then the platform data directory.
pub fn resolve_db_path(
    cli_path: Option<&Path>,
    config: &ClientConfig,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_path.or(config.db_path.as_deref()) {
        return Ok(path.to_path_buf());
    }
    default_db_path()
}

pub fn load_config(global: &GlobalArgs) -> Result<ClientConfig, CliError> {
    let path = resolve_config_path(global.config.as_deref())?;
    Ok(ClientConfig::load(&path)?)
}

pub async fn open_session(
    global: &GlobalArgs,
    reachability: Reachability,
) -> Result<Session, CliError> {
    let config = load_config(global)?;
    let db_path = resolve_db_path(global.db_path.as_deref(), &config)?;
    let store = LibSqlStore::open(&db_path).await?;
    let api = HttpNotesApi::from_config(&config)?;

    let online = match (&api, reachability) {
        (Some(api), Reachability::Probe) if !global.offline => api.probe().await,
        _ => false,
    };
    if reachability == Reachability::Probe && api.is_some() && !online && !global.offline {
        tracing::info!("Backend unreachable, working offline");
    }
    let monitor = ConnectivityMonitor::new(online);

    let service = match api.clone() {
        Some(api) => OfflineService::new(store, api, monitor.clone()),
        None => OfflineService::local_only(store, monitor.clone()),
    }
    .with_max_attempts(config.max_sync_attempts);

    Ok(Session {
        config,
        service,
        monitor,
        api,
    })
}

pub fn parse_note_key(raw: &str) -> Result<NoteKey, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::InvalidNoteKey(raw.trim().to_string()))
}

/// Editor route of a note, which also scopes its draft.
pub fn editor_route(id: Option<i64>) -> String {
    id.map_or_else(|| "/notes/new".to_string(), |id| format!("/notes/{id}/edit"))
}

pub fn normalize_content(content: &str) -> String {
    content.trim().to_string()
}

pub fn note_preview(note: &OfflineNote) -> String {
    let source = if note.title.trim().is_empty() {
        &note.content
    } else {
        &note.title
    };
    let line = source.lines().next().unwrap_or("").trim();
    let preview: String = line.chars().take(60).collect();
    if line.chars().count() > 60 {
        format!("{preview}...")
    } else {
        preview
    }
}

pub fn format_note_lines(notes: &[OfflineNote]) -> Vec<String> {
    format_note_lines_at(notes, Utc::now().timestamp_millis())
}

pub fn format_note_lines_at(notes: &[OfflineNote], now_ms: i64) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let key = note
                .id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let marker = if note.is_new { " [new]" } else { "" };
            format!(
                "{key:<18} {:>8}  {}{marker}",
                format_relative_time(note.timestamp, now_ms),
                note_preview(note)
            )
        })
        .collect()
}

pub fn format_queue_lines(items: &[SyncItem]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let target = item
                .note_id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
            let mut line = format!(
                "[{index}] {:<6} {target:<18} attempts={} id={}",
                item.kind, item.attempts, item.id
            );
            if let Some(error) = &item.last_error {
                line.push_str(&format!("  last error: {error}"));
            }
            line
        })
        .collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
