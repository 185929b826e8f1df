use anyhow::{Result, bail};
use chrono::Utc;
use rollcall_core::StatusBus;

use super::{ReaderMode, format_event, open_station};
use crate::config::AppConfig;

/// List check-ins waiting to sync, in the order they will be sent.
pub async fn pending(config: &AppConfig, offline: bool, limit: usize, json: bool) -> Result<()> {
    let station = open_station(config, offline, ReaderMode::Detached, StatusBus::new()).await?;
    let entries = station.pending_entries(limit).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Nothing waiting to sync");
        return Ok(());
    }

    for entry in &entries {
        let name = station.guest_name(&entry.guest_id).await;
        println!(
            "{}  {:<8} {:<20} {:<12} {}",
            entry.detected_at.format("%Y-%m-%d %H:%M:%S"),
            entry.mark.display_name(),
            name.as_deref().unwrap_or(entry.guest_id.as_str()),
            entry.station.name(),
            entry.sync_state,
        );
    }

    let total = station.pending_count().await;
    if total > entries.len() {
        println!("... and {} more", total - entries.len());
    }
    Ok(())
}

/// Move synced entries past the retention window into the archive.
pub async fn compact(config: &AppConfig, offline: bool) -> Result<()> {
    let station = open_station(config, offline, ReaderMode::Detached, StatusBus::new()).await?;
    let report = station.ledger().compact(Utc::now()).await?;

    println!(
        "Archived {} entries, {} remain in the journal",
        report.archived, report.retained
    );
    Ok(())
}

/// Drop every unsynced entry. Requires `--yes`.
pub async fn clear_queue(config: &AppConfig, offline: bool, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("this discards check-ins that never reached the directory; pass --yes to confirm");
    }

    let bus = StatusBus::new();
    bus.spawn_listener(|event| println!("{}", format_event(&event)));
    let station = open_station(config, offline, ReaderMode::Detached, bus).await?;
    station.clear_queue().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_queue_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let err = clear_queue(&config, true, false).await.unwrap_err();
        assert!(err.to_string().contains("--yes"));
        clear_queue(&config, true, true).await.unwrap();
    }
}
