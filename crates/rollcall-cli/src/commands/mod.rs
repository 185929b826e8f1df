//! Subcommand implementations and the wiring they share.

pub mod queue;
pub mod readers;
pub mod run;
pub mod status;
pub mod sync;
pub mod tags;

use anyhow::{Result, bail};
use rollcall_core::{Severity, StatusBus, StatusEvent};
use rollcall_hardware::{AnyTagReader, ReaderPort, ReaderSelector, SelectedReader};
use rollcall_hardware::mock::MockReader;
use rollcall_network::{AnyDirectory, MemoryDirectory, SheetClient};
use rollcall_station::StationService;
use rollcall_storage::{AttendanceLedger, SnapshotCache, TagRegistry};
use rollcall_sync::SyncCoordinator;
use std::sync::Arc;
use tracing::info;

use crate::config::{AppConfig, ENDPOINT_ENV};

pub type Station = Arc<StationService<AnyDirectory>>;

/// How a command needs the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    /// Probe backends and bind the first that answers.
    Probe,
    /// Do not touch hardware; the port stays disconnected.
    Detached,
}

/// Open the stores, the directory and the reader, and assemble a station.
pub async fn open_station(
    config: &AppConfig,
    offline: bool,
    reader: ReaderMode,
    bus: StatusBus,
) -> Result<Station> {
    let registry = Arc::new(TagRegistry::open(&config.storage).await?);
    let ledger = Arc::new(AttendanceLedger::open(&config.storage).await?);
    let snapshots = Arc::new(SnapshotCache::open(&config.storage).await?);

    let directory = open_directory(config, offline)?;
    let sync = SyncCoordinator::new(
        directory,
        Arc::clone(&ledger),
        Arc::clone(&snapshots),
        config.sync.clone(),
    )
    .with_status(bus.clone());

    let selected = match reader {
        ReaderMode::Probe => ReaderSelector::new(config.reader.clone()).select().await,
        ReaderMode::Detached => SelectedReader {
            reader: AnyTagReader::from(MockReader::default()),
            info: None,
        },
    };
    let port = ReaderPort::new(selected, &config.reader).with_status(bus.clone());

    let station = StationService::new(
        &config.station,
        port,
        registry,
        ledger,
        snapshots,
        Arc::new(sync),
        bus,
    )?;
    Ok(Arc::new(station))
}

/// Pick the directory backend.
///
/// `--offline` uses a directory that is never reachable: every sync cycle
/// ends offline, check-ins stay queued and the snapshot cache keeps serving
/// guest names.
fn open_directory(config: &AppConfig, offline: bool) -> Result<AnyDirectory> {
    if offline {
        info!("offline mode, directory disabled");
        let directory = MemoryDirectory::new();
        directory.set_online(false);
        return Ok(directory.into());
    }

    if !config.directory.is_configured() {
        bail!(
            "no directory endpoint configured; set directory.endpoint or {ENDPOINT_ENV}, or pass --offline"
        );
    }

    Ok(SheetClient::new(config.directory.clone())?.into())
}

/// One status line as shown on the terminal.
pub fn format_event(event: &StatusEvent) -> String {
    let marker = match event.severity {
        Severity::Info => "   ",
        Severity::Success => " ok",
        Severity::Warning => "  !",
        Severity::Error => "!!!",
    };
    format!(
        "{} {marker} {}",
        event.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
        event.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rollcall_core::{DirectorySnapshot, GuestId, GuestRecord, StatusKind, TagUid};
    use rollcall_network::GuestDirectory;
    use rollcall_storage::SyncState;
    use rollcall_sync::CycleOutcome;
    use rstest::rstest;

    #[rstest]
    #[case(Severity::Info, "   ")]
    #[case(Severity::Success, " ok")]
    #[case(Severity::Warning, "  !")]
    #[case(Severity::Error, "!!!")]
    fn test_format_event_marker(#[case] severity: Severity, #[case] marker: &str) {
        let event = StatusEvent {
            kind: StatusKind::CheckIn,
            severity,
            message: "Welcome, Ada".to_string(),
            at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        };

        let line = format_event(&event);
        assert!(line.ends_with(&format!("{marker} Welcome, Ada")), "{line}");
    }

    #[tokio::test]
    async fn test_offline_directory_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let bus = StatusBus::new();
        let station = open_station(&config, true, ReaderMode::Detached, bus)
            .await
            .unwrap();

        assert!(!station.reader_ready());
        assert!(station.sync().directory().fetch_snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_offline_sync_keeps_queue_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let cached = DirectorySnapshot::new(
            fetched_at,
            vec![GuestRecord::new(GuestId::from(1001), "Ada Lovelace")],
        );
        SnapshotCache::open(&config.storage)
            .await
            .unwrap()
            .store(cached)
            .await
            .unwrap();

        {
            let station = open_station(&config, true, ReaderMode::Detached, StatusBus::new())
                .await
                .unwrap();
            let tag = TagUid::new("04A1").unwrap();
            station
                .registry()
                .register(tag.clone(), GuestId::from(1001))
                .await
                .unwrap();
            station.check_in_tag(&tag).await.unwrap();

            let report = station.sync_now().await.unwrap();
            assert_eq!(report.outcome, CycleOutcome::Offline);
            assert_eq!(report.written, 0);
        }

        let ledger = AttendanceLedger::open(&config.storage).await.unwrap();
        let entries = ledger.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sync_state, SyncState::Pending);
        assert_eq!(ledger.counts().await.outstanding(), 1);

        let snapshots = SnapshotCache::open(&config.storage).await.unwrap();
        assert_eq!(snapshots.fetched_at().await, Some(fetched_at));
        assert_eq!(
            snapshots.guest_name(&GuestId::from(1001)).await.as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_requires_offline() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let err = open_station(&config, false, ReaderMode::Detached, StatusBus::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--offline"));
    }
}
