use bytenote_core::models::Draft;
use chrono::{TimeZone, Utc};

use crate::cli::GlobalArgs;
use crate::commands::common::{open_session, Reachability};
use crate::error::CliError;

pub async fn run_draft_list(global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let drafts = session.service.list_drafts().await;

    if drafts.is_empty() {
        println!("No drafts.");
    }
    for (route, draft) in drafts {
        println!("{route:<24} {}", describe_draft(&draft));
    }
    Ok(())
}

pub async fn run_draft_show(route: &str, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let Some(draft) = session.service.drafts(route).load().await else {
        println!("No draft for {route}");
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

pub async fn run_draft_clear(route: &str, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    session.service.drafts(route).purge().await;
    println!("Cleared draft for {route}");
    Ok(())
}

pub fn describe_draft(draft: &Draft) -> String {
    let title = draft
        .title
        .as_deref()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or("(untitled)");
    let saved = draft
        .saved_at
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .map_or_else(
            || "unknown time".to_string(),
            |time| time.format("%Y-%m-%d %H:%M").to_string(),
        );
    format!("{title} (saved {saved})")
}
