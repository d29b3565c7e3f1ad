use crate::cli::GlobalArgs;
use crate::commands::common::{load_config, resolve_config_path, resolve_db_path};
use crate::error::CliError;

pub fn run_config_show(as_json: bool, global: &GlobalArgs) -> Result<(), CliError> {
    let config_path = resolve_config_path(global.config.as_deref())?;
    let config = load_config(global)?;
    let db_path = resolve_db_path(global.db_path.as_deref(), &config)?;

    if as_json {
        let mut value = serde_json::to_value(&config)?;
        if config.session_token.is_some() {
            value["session_token"] = serde_json::Value::from("[REDACTED]");
        }
        value["db_path"] = serde_json::Value::from(db_path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Config file:       {}", config_path.display());
    println!("Database:          {}", db_path.display());
    println!(
        "API base URL:      {}",
        config.api_base_url.as_deref().unwrap_or("(not set, local only)")
    );
    println!(
        "Session token:     {}",
        if config.session_token.is_some() { "set" } else { "not set" }
    );
    println!("Max sync attempts: {}", config.max_sync_attempts);
    println!("Draft debounce:    {} ms", config.draft_debounce_ms);
    println!(
        "Request timeout:   {}",
        config
            .request_timeout_secs
            .map_or_else(|| "none".to_string(), |secs| format!("{secs} s"))
    );
    println!("Probe interval:    {} s", config.probe_interval_secs);
    Ok(())
}
