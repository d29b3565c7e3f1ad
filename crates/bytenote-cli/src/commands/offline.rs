use crate::cli::GlobalArgs;
use crate::commands::common::{
    format_note_lines, open_session, parse_note_key, Reachability,
};
use crate::error::CliError;

pub async fn run_offline_list(
    limit: usize,
    as_json: bool,
    global: &GlobalArgs,
) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Skip).await?;
    let mut notes = session.service.get_all_offline_notes().await;
    notes.truncate(limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No offline notes.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_offline_show(key: &str, as_json: bool, global: &GlobalArgs) -> Result<(), CliError> {
    let key = parse_note_key(key)?;
    let session = open_session(global, Reachability::Skip).await?;
    let note = session
        .service
        .get_offline_note(&key)
        .await
        .ok_or_else(|| CliError::NoteNotFound(key.to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&note)?);
        return Ok(());
    }

    println!("Key:      {key}");
    println!("Title:    {}", note.title);
    if let Some(category_id) = note.category_id {
        println!("Category: {category_id}");
    }
    if !note.tag_ids.is_empty() {
        let tags: Vec<String> = note.tag_ids.iter().map(ToString::to_string).collect();
        println!("Tags:     {}", tags.join(", "));
    }
    println!("Synced:   {}", if note.is_new { "no" } else { "yes" });
    println!();
    println!("{}", note.content);
    Ok(())
}

pub async fn run_offline_search(
    query: &str,
    as_json: bool,
    global: &GlobalArgs,
) -> Result<(), CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::EmptySearchQuery);
    }
    let session = open_session(global, Reachability::Skip).await?;
    let notes = session.service.search_offline_notes(query).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }
    Ok(())
}
