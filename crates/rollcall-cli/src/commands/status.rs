use anyhow::Result;
use rollcall_core::StatusBus;
use rollcall_storage::LedgerCounts;
use rollcall_sync::SyncStatus;
use serde::Serialize;

use super::{ReaderMode, open_station};
use crate::config::AppConfig;

#[derive(Serialize)]
struct StatusOutput {
    station: String,
    data_dir: String,
    registry_degraded: bool,
    registered_tags: usize,
    ledger: LedgerCounts,
    sync: SyncStatus,
}

/// Print station, queue and sync status.
pub async fn execute(config: &AppConfig, offline: bool, json: bool) -> Result<()> {
    let station = open_station(config, offline, ReaderMode::Detached, StatusBus::new()).await?;
    let status = station.status().await;

    let output = StatusOutput {
        station: status.station,
        data_dir: config.storage.data_dir.display().to_string(),
        registry_degraded: status.registry_degraded,
        registered_tags: status.registered_tags,
        ledger: station.ledger().counts().await,
        sync: status.sync,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Station:    {}", output.station);
    println!("Data dir:   {}", output.data_dir);
    println!(
        "Registry:   {} tags{}",
        output.registered_tags,
        if output.registry_degraded { " (recovered)" } else { "" }
    );
    println!(
        "Check-ins:  {} pending, {} failed, {} synced",
        output.ledger.pending, output.ledger.failed, output.ledger.synced
    );
    match output.sync.snapshot_fetched_at {
        Some(at) => println!("Directory:  cached {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Directory:  never fetched"),
    }
    if let Some(at) = output.sync.last_success_at {
        println!("Last sync:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}
