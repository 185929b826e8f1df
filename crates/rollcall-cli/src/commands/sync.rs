use anyhow::{Result, bail};
use rollcall_core::StatusBus;

use super::{ReaderMode, open_station};
use crate::config::AppConfig;

/// Run one sync cycle and report what it did.
pub async fn execute(config: &AppConfig, offline: bool) -> Result<()> {
    if offline {
        bail!("sync needs the directory; run without --offline");
    }
    let station = open_station(config, offline, ReaderMode::Detached, StatusBus::new()).await?;
    let report = station.sync_now().await?;

    if report.is_offline() {
        let reason = report.error.unwrap_or_else(|| "directory unreachable".to_string());
        bail!("directory offline: {reason}");
    }

    println!(
        "Wrote {} cells, {} already recorded, {} failed",
        report.written, report.already_recorded, report.failed
    );
    if report.promoted > 0 {
        println!("Retried {} previously failed check-ins", report.promoted);
    }
    if let Some(error) = report.error {
        println!("Last error: {error}");
    }

    let pending = station.pending_count().await;
    if pending > 0 {
        println!("{pending} check-ins still pending");
    }
    Ok(())
}
