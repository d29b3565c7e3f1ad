use std::time::Duration;

use bytenote_core::sync::spawn_auto_sync;
use bytenote_core::SyncReport;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::cli::GlobalArgs;
use crate::commands::common::{open_session, Reachability};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncSummary {
    #[serde(flatten)]
    pub report: SyncReport,
    pub pending: usize,
}

pub async fn run_sync(as_json: bool, global: &GlobalArgs) -> Result<(), CliError> {
    let session = open_session(global, Reachability::Probe).await?;
    if session.api.is_none() {
        return Err(CliError::BackendNotConfigured);
    }

    let report = session.service.sync_offline_changes().await;
    let pending = session.service.pending_count().await;

    if as_json {
        let summary = SyncSummary { report, pending };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_sync_report(&report, pending));
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport, pending: usize) -> String {
    if report.skipped {
        return format!("Offline, {pending} change(s) waiting to sync");
    }
    let mut summary = format!("Synced {}, failed {}", report.success, report.failed);
    if report.deferred > 0 {
        summary.push_str(&format!(", deferred {}", report.deferred));
    }
    if report.dead_lettered > 0 {
        summary.push_str(&format!(
            ", {} moved to dead letters (see `bytenote queue dead-letters`)",
            report.dead_lettered
        ));
    }
    summary.push_str(&format!("; {pending} change(s) pending"));
    summary
}

pub async fn run_watch(global: &GlobalArgs) -> Result<(), CliError> {
    if global.offline {
        return Err(CliError::Config(
            "`watch` needs the network; drop --offline".to_string(),
        ));
    }
    let session = open_session(global, Reachability::Probe).await?;
    let Some(api) = session.api.clone() else {
        return Err(CliError::BackendNotConfigured);
    };

    let auto_sync = spawn_auto_sync(session.service.clone(), &session.monitor);
    let mut ticker =
        tokio::time::interval(session.config.probe_interval().max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    println!("Watching {} (Ctrl-C to stop)", api.base_url());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                session.monitor.set_online(api.probe().await);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    auto_sync.stop().await;
    println!(
        "Stopped, {} change(s) pending",
        session.service.pending_count().await
    );
    Ok(())
}
