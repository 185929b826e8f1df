//! Foreground scan loop.
//!
//! Polls the reader on a fixed period and turns every detected tag into a
//! check-in. The loop runs on its own task and is stopped through a
//! [`CancellationToken`]: cancellation is checked between polls, never
//! during one, so an in-flight hardware transaction always runs to its own
//! timeout and the port is never left mid-read.

use crate::service::{CheckInOutcome, StationService};
use rollcall_hardware::PollOutcome;
use rollcall_network::GuestDirectory;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle to a running scan loop.
#[derive(Debug)]
pub struct ScanLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScanLoop {
    /// Start scanning on a new task.
    pub fn spawn<D>(service: Arc<StationService<D>>) -> Self
    where
        D: GuestDirectory + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { run(service, token).await });
        Self { cancel, task }
    }

    /// Start scanning under an existing token, e.g. one shared with the sync loop.
    pub fn spawn_with_token<D>(service: Arc<StationService<D>>, cancel: CancellationToken) -> Self
    where
        D: GuestDirectory + 'static,
    {
        let token = cancel.clone();
        let task = tokio::spawn(async move { run(service, token).await });
        Self { cancel, task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait for the current poll to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "scan loop task failed");
        }
    }
}

/// Scan until `cancel` fires.
pub async fn run<D: GuestDirectory>(service: Arc<StationService<D>>, cancel: CancellationToken) {
    let period = service.scan_period();
    let station = service.station().await;
    info!(station = %station, "scan loop started");

    while !cancel.is_cancelled() {
        match service.poll().await {
            PollOutcome::Tag(uid) => match service.check_in_tag(&uid).await {
                Ok(CheckInOutcome::Recorded { entry, .. }) => {
                    debug!(entry_id = %entry.entry_id, "scan recorded");
                }
                Ok(_) => {}
                Err(e) => error!(tag_uid = %uid, error = %e, "failed to record check-in"),
            },
            PollOutcome::NoTag | PollOutcome::Disconnected => {}
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }
    }

    info!("scan loop stopped");
}
