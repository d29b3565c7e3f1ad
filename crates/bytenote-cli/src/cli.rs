use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bytenote")]
#[command(about = "Write notes anywhere, sync them when the network is back")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GlobalArgs {
    /// Optional path to the local storage database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to config.json
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Treat the backend as unreachable
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a note, queueing it when offline
    Save {
        /// Server id of the note to update (omit to create)
        #[arg(long)]
        id: Option<i64>,
        /// Note title
        #[arg(short, long, default_value = "")]
        title: String,
        /// Category id
        #[arg(long)]
        category: Option<i64>,
        /// Tag id (repeatable)
        #[arg(long = "tag", value_name = "ID")]
        tags: Vec<i64>,
        /// Apply the saved draft for this note before saving
        #[arg(long, requires = "id")]
        resume_draft: bool,
        /// Read the content from stdin, autosaving a draft while typing
        #[arg(long, conflicts_with = "content")]
        stdin: bool,
        /// Note content
        content: Vec<String>,
    },
    /// Delete a note by server id, queueing it when offline
    Delete {
        /// Server id
        id: i64,
    },
    /// Inspect notes stored on this device
    Offline {
        #[command(subcommand)]
        command: OfflineCommands,
    },
    /// Inspect and edit the sync queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Replay queued changes against the backend
    Sync {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep probing the backend and sync whenever it comes back
    Watch,
    /// Inspect editor drafts
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Show the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum OfflineCommands {
    /// List offline notes, most recently modified first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one offline note
    Show {
        /// Server id or temporary key (temp_...)
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search offline notes by title or content
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// List pending changes, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the change at a queue position
    Remove {
        /// Position as shown by `queue list`
        index: usize,
    },
    /// Drop every pending change
    Clear {
        /// Confirm dropping unsynced changes
        #[arg(long)]
        yes: bool,
    },
    /// List changes that gave up after repeated failures
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a dead-lettered change back into the queue
    Requeue {
        /// Item id as shown by `queue dead-letters`
        id: String,
    },
}

#[derive(Subcommand)]
pub enum DraftCommands {
    /// List saved drafts
    List,
    /// Show the draft of an editor route
    Show {
        /// Editor route, e.g. /notes/new or /notes/42/edit
        #[arg(long, default_value = "/notes/new")]
        route: String,
    },
    /// Delete the draft of an editor route
    Clear {
        /// Editor route, e.g. /notes/new or /notes/42/edit
        #[arg(long, default_value = "/notes/new")]
        route: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
