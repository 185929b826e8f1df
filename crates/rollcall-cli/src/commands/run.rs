use anyhow::Result;
use rollcall_core::StatusBus;
use rollcall_station::ScanLoop;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{ReaderMode, format_event, open_station};
use crate::config::AppConfig;

/// Scan and sync until Ctrl-C.
pub async fn execute(config: &AppConfig, offline: bool) -> Result<()> {
    let bus = StatusBus::new();
    let printer = bus.spawn_listener(|event| println!("{}", format_event(&event)));

    let station = open_station(config, offline, ReaderMode::Probe, bus).await?;
    let status = station.status().await;
    println!(
        "{} ready: reader {}, {} registered tags, {} pending",
        status.station,
        if status.reader_ready { "connected" } else { "disconnected" },
        status.registered_tags,
        station.pending_count().await,
    );

    let cancel = CancellationToken::new();
    let coordinator = Arc::clone(station.sync());
    let sync_cancel = cancel.clone();
    let sync_task = tokio::spawn(async move { coordinator.run(sync_cancel).await });
    let scan = ScanLoop::spawn_with_token(Arc::clone(&station), cancel.clone());

    println!("Present a tag to check in. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    cancel.cancel();
    scan.stop().await;
    if let Err(e) = sync_task.await {
        error!(error = %e, "sync loop task failed");
    }

    // last chance to flush before the station goes dark
    match station.sync_now().await {
        Ok(report) if report.synced() > 0 => println!("Synced {} check-ins", report.synced()),
        Ok(_) => {}
        Err(e) => error!(error = %e, "final sync failed"),
    }

    let pending = station.pending_count().await;
    if pending > 0 {
        println!("{pending} check-ins still waiting to sync");
    }

    // the printer drains buffered events once the last bus clone is gone
    drop(station);
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        debug!("status printer still busy at exit");
    }
    Ok(())
}
