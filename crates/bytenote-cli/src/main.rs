//! ByteNote CLI - offline-first notes from the terminal
//!
//! Saves go straight to the backend when it is reachable and into the
//! local sync queue when it is not.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{
    Cli, Commands, ConfigCommands, DraftCommands, OfflineCommands, QueueCommands,
};
use crate::commands::config::run_config_show;
use crate::commands::draft::{run_draft_clear, run_draft_list, run_draft_show};
use crate::commands::offline::{run_offline_list, run_offline_search, run_offline_show};
use crate::commands::queue::{
    run_dead_letters, run_queue_clear, run_queue_list, run_queue_remove, run_requeue,
};
use crate::commands::save::{run_delete, run_save, SaveArgs};
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bytenote=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = &cli.global;

    match cli.command {
        Commands::Save {
            id,
            title,
            category,
            tags,
            resume_draft,
            stdin,
            content,
        } => {
            let args = SaveArgs {
                id,
                title,
                content,
                category,
                tags,
                resume_draft,
                stdin,
            };
            run_save(args, global).await?;
        }
        Commands::Delete { id } => run_delete(id, global).await?,
        Commands::Offline { command } => match command {
            OfflineCommands::List { limit, json } => run_offline_list(limit, json, global).await?,
            OfflineCommands::Show { key, json } => run_offline_show(&key, json, global).await?,
            OfflineCommands::Search { query, json } => {
                run_offline_search(&query, json, global).await?;
            }
        },
        Commands::Queue { command } => match command {
            QueueCommands::List { json } => run_queue_list(json, global).await?,
            QueueCommands::Remove { index } => run_queue_remove(index, global).await?,
            QueueCommands::Clear { yes } => run_queue_clear(yes, global).await?,
            QueueCommands::DeadLetters { json } => run_dead_letters(json, global).await?,
            QueueCommands::Requeue { id } => run_requeue(&id, global).await?,
        },
        Commands::Sync { json } => run_sync(json, global).await?,
        Commands::Watch => run_watch(global).await?,
        Commands::Draft { command } => match command {
            DraftCommands::List => run_draft_list(global).await?,
            DraftCommands::Show { route } => run_draft_show(&route, global).await?,
            DraftCommands::Clear { route } => run_draft_clear(&route, global).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { json } => run_config_show(json, global)?,
        },
    }

    Ok(())
}
