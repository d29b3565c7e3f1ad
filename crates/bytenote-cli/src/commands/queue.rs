use bytenote_core::SyncItemId;

use crate::cli::GlobalArgs;
use crate::commands::common::{format_queue_lines, open_session, Reachability};
use crate::error::CliError;

pub async fn run_queue_list(as_json: bool, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let items = session.service.get_sync_queue().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Sync queue is empty.");
    } else {
        for line in format_queue_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_queue_remove(index: usize, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let removed = session
        .service
        .remove_sync_item(index)
        .await
        .ok_or(CliError::QueueIndexOutOfRange(index))?;
    println!("Removed {} item {}", removed.kind, removed.id);
    Ok(())
}

pub async fn run_queue_clear(confirmed: bool, global: &GlobalArgs) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }
    let session = open_session(global, Reachability::Skip).await?;
    let pending = session.service.pending_count().await;
    session.service.clear_sync_queue().await;
    println!("Dropped {pending} pending change(s)");
    Ok(())
}

pub async fn run_dead_letters(as_json: bool, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let items = session.service.dead_letters().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No dead-lettered changes.");
    } else {
        for line in format_queue_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_requeue(id: &str, global: &GlobalArgs) -> Result<(), CliError> {
    let item_id: SyncItemId = id
        .parse()
        .map_err(|_| CliError::InvalidItemId(id.trim().to_string()))?;
    let session = open_session(global, Reachability::Skip).await?;
    if !session.service.requeue_dead_letter(item_id).await {
        return Err(CliError::DeadLetterNotFound(item_id.to_string()));
    }
    println!("Requeued {item_id}");
    Ok(())
}
