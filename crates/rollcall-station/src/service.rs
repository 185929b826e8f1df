//! Station façade consumed by the presentation layer.
//!
//! [`StationService`] ties the reader port, the tag registry, the ledger and
//! the sync coordinator together behind the operations an operator actually
//! performs: scan a guest in, bind a tag to a guest, erase a tag, mark a
//! guest absent. Every outcome is also published on the [`StatusBus`].
//!
//! All operations are bounded. The tag operations wait for a tag up to the
//! reader's write timeout; everything else only touches local files.

use crate::config::StationConfig;
use crate::error::{StationError, StationResult};
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceMark, GuestId, Severity, Station, StatusBus, StatusKind, TagUid,
};
use rollcall_hardware::{HardwareError, PollOutcome, Readiness, ReaderPort, ndef};
use rollcall_network::GuestDirectory;
use rollcall_storage::{
    AppendOutcome, AttendanceLedger, CheckInEntry, RegistrySource, SnapshotCache,
    StatusMessages, StorageError, TagBinding, TagRegistry,
};
use rollcall_sync::{SyncCoordinator, SyncStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of presenting a tag at the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// New check-in recorded.
    Recorded {
        entry: CheckInEntry,
        guest_name: Option<String>,
    },

    /// Same guest scanned again within the debounce window.
    Debounced { entry: CheckInEntry },

    /// Tag is not bound to any guest.
    UnknownTag(TagUid),
}

impl CheckInOutcome {
    pub fn entry(&self) -> Option<&CheckInEntry> {
        match self {
            Self::Recorded { entry, .. } | Self::Debounced { entry } => Some(entry),
            Self::UnknownTag(_) => None,
        }
    }
}

/// Snapshot of everything a status bar shows.
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub station: String,
    pub reader_ready: bool,
    pub registry_degraded: bool,
    pub registered_tags: usize,
    pub sync: SyncStatus,
}

/// Check-in station.
pub struct StationService<D> {
    station: RwLock<Station>,
    scan_period: Duration,
    port: Mutex<ReaderPort>,
    readiness: Readiness,
    registry: Arc<TagRegistry>,
    ledger: Arc<AttendanceLedger>,
    snapshots: Arc<SnapshotCache>,
    sync: Arc<SyncCoordinator<D>>,
    bus: StatusBus,
}

impl<D> std::fmt::Debug for StationService<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationService")
            .field("scan_period", &self.scan_period)
            .finish_non_exhaustive()
    }
}

impl<D: GuestDirectory> StationService<D> {
    /// Assemble a station from already opened parts.
    ///
    /// A registry that had to be recovered is reported on the bus here, once.
    ///
    /// # Errors
    ///
    /// Returns `Core` if the configured station name is invalid.
    pub fn new(
        config: &StationConfig,
        port: ReaderPort,
        registry: Arc<TagRegistry>,
        ledger: Arc<AttendanceLedger>,
        snapshots: Arc<SnapshotCache>,
        sync: Arc<SyncCoordinator<D>>,
        bus: StatusBus,
    ) -> StationResult<Self> {
        let station = config.station()?;

        match registry.source() {
            RegistrySource::Backup => {
                bus.emit(
                    StatusKind::Registry,
                    Severity::Warning,
                    StatusMessages::REGISTRY_RECOVERED,
                );
            }
            RegistrySource::Reset => {
                bus.emit(
                    StatusKind::Registry,
                    Severity::Error,
                    StatusMessages::REGISTRY_RESET,
                );
            }
            RegistrySource::Primary | RegistrySource::Fresh => {}
        }

        info!(station = %station, backend = %port.backend(), "station ready");
        Ok(Self {
            station: RwLock::new(station),
            scan_period: config.scan_period(),
            readiness: port.readiness(),
            port: Mutex::new(port),
            registry,
            ledger,
            snapshots,
            sync,
            bus,
        })
    }

    pub async fn station(&self) -> Station {
        self.station.read().await.clone()
    }

    /// Switch this station to another check-in point.
    pub async fn set_station(&self, station: Station) {
        info!(station = %station, "station switched");
        *self.station.write().await = station;
    }

    pub fn scan_period(&self) -> Duration {
        self.scan_period
    }

    pub fn status_bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &AttendanceLedger {
        &self.ledger
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator<D>> {
        &self.sync
    }

    /// Poll the reader once.
    ///
    /// Holds the port for at most one poll timeout.
    pub async fn poll(&self) -> PollOutcome {
        self.port.lock().await.poll().await
    }

    /// Whether the reader is connected. Does not wait for the port.
    pub fn reader_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Record a scan of `tag_uid` detected now.
    ///
    /// # Errors
    ///
    /// Only a failure to write the ledger is an error. Unknown tags and
    /// repeated scans are outcomes.
    pub async fn check_in_tag(&self, tag_uid: &TagUid) -> StationResult<CheckInOutcome> {
        self.check_in_tag_at(tag_uid, Utc::now()).await
    }

    pub async fn check_in_tag_at(
        &self,
        tag_uid: &TagUid,
        detected_at: DateTime<Utc>,
    ) -> StationResult<CheckInOutcome> {
        let Some(guest_id) = self.registry.lookup(tag_uid).await else {
            warn!(tag_uid = %tag_uid, "scanned tag is not registered");
            self.bus.emit(
                StatusKind::CheckIn,
                Severity::Warning,
                StatusMessages::UNKNOWN_TAG,
            );
            return Ok(CheckInOutcome::UnknownTag(tag_uid.clone()));
        };

        let station = self.station().await;
        let outcome = self
            .ledger
            .append(guest_id.clone(), station, AttendanceMark::Present, detected_at)
            .await?;

        match outcome {
            AppendOutcome::Recorded(entry) => {
                let guest_name = self.snapshots.guest_name(&guest_id).await;
                let display = guest_name.as_deref().unwrap_or(guest_id.as_str());
                self.bus.emit(
                    StatusKind::CheckIn,
                    Severity::Success,
                    StatusMessages::welcome(display),
                );
                self.sync.trigger();
                Ok(CheckInOutcome::Recorded { entry, guest_name })
            }
            AppendOutcome::Debounced(entry) => {
                self.bus.emit(
                    StatusKind::CheckIn,
                    Severity::Info,
                    StatusMessages::ALREADY_CHECKED_IN,
                );
                Ok(CheckInOutcome::Debounced { entry })
            }
        }
    }

    /// Record an explicit absence for `guest_id` at this station.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    pub async fn mark_absent(&self, guest_id: GuestId) -> StationResult<AppendOutcome> {
        let station = self.station().await;
        let outcome = self
            .ledger
            .append(
                guest_id.clone(),
                station.clone(),
                AttendanceMark::Absent,
                Utc::now(),
            )
            .await?;

        if outcome.is_recorded() {
            let name = self.display_name(&guest_id).await;
            self.bus.emit(
                StatusKind::CheckIn,
                Severity::Info,
                StatusMessages::marked_absent(&name, station.name()),
            );
            self.sync.trigger();
        }
        Ok(outcome)
    }

    /// Bind the next presented tag to `guest_id` and write the guest id onto it.
    ///
    /// Fails closed: a tag already bound to another guest is left untouched
    /// and `AlreadyRegistered` is returned, and a guest who already holds a
    /// different tag gets `GuestAlreadyBound`. Use [`rewrite_tag`](Self::rewrite_tag)
    /// after the operator confirms.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` if the reader is disconnected, `WriteTimeout` if no
    /// tag is presented in time, or the write or registry error.
    pub async fn write_tag(&self, guest_id: GuestId) -> StationResult<TagBinding> {
        let mut port = self.port.lock().await;
        let tag_uid = self.await_tag(&mut port).await?;

        if let Some(existing) = self.registry.lookup(&tag_uid).await
            && existing != guest_id
        {
            warn!(tag_uid = %tag_uid, existing = %existing, requested = %guest_id,
                "refusing to rebind tag");
            let name = self.display_name(&existing).await;
            self.bus.emit(
                StatusKind::Registry,
                Severity::Warning,
                StatusMessages::tag_taken(&name),
            );
            return Err(StorageError::AlreadyRegistered { tag_uid, existing }.into());
        }

        if let Some(existing_tag) = self.registry.tag_for(&guest_id).await
            && existing_tag != tag_uid
        {
            warn!(guest_id = %guest_id, existing_tag = %existing_tag, presented = %tag_uid,
                "refusing second tag for guest");
            let name = self.display_name(&guest_id).await;
            self.bus.emit(
                StatusKind::Registry,
                Severity::Warning,
                StatusMessages::guest_has_tag(&name),
            );
            return Err(StorageError::GuestAlreadyBound {
                guest_id,
                existing_tag,
            }
            .into());
        }

        let payload = ndef::text_message(guest_id.as_str())?;
        let written = port.write(Some(&tag_uid), &payload).await?;
        let binding = self.registry.register(written, guest_id.clone()).await?;

        let name = self.display_name(&guest_id).await;
        self.bus.emit(
            StatusKind::Registry,
            Severity::Success,
            StatusMessages::tag_registered(&name),
        );
        Ok(binding)
    }

    /// Bind the next presented tag to `guest_id`, replacing any binding.
    ///
    /// Returns the guest the tag belonged to before, if any. A tag the guest
    /// held before is unbound.
    ///
    /// # Errors
    ///
    /// Same as [`write_tag`](Self::write_tag), minus the binding conflicts.
    pub async fn rewrite_tag(&self, guest_id: GuestId) -> StationResult<Option<GuestId>> {
        let mut port = self.port.lock().await;
        let tag_uid = self.await_tag(&mut port).await?;

        let payload = ndef::text_message(guest_id.as_str())?;
        let written = port.write(Some(&tag_uid), &payload).await?;
        let previous = self.registry.rewrite(written, guest_id.clone()).await?;

        let name = self.display_name(&guest_id).await;
        self.bus.emit(
            StatusKind::Registry,
            Severity::Success,
            StatusMessages::tag_registered(&name),
        );
        Ok(previous)
    }

    /// Blank the next presented tag and drop its binding.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tag was not registered; the tag is still
    /// blanked in that case.
    pub async fn erase_tag(&self) -> StationResult<TagBinding> {
        let mut port = self.port.lock().await;
        let tag_uid = self.await_tag(&mut port).await?;

        let written = port
            .write(Some(&tag_uid), &ndef::empty_message())
            .await?;
        let binding = self.registry.erase(&written).await?;

        self.bus.emit(
            StatusKind::Registry,
            Severity::Success,
            StatusMessages::TAG_ERASED,
        );
        Ok(binding)
    }

    /// Wait up to the write timeout for a tag on the reader.
    async fn await_tag(&self, port: &mut ReaderPort) -> StationResult<TagUid> {
        if !port.is_ready() && !port.try_reconnect().await {
            self.bus.emit(
                StatusKind::Reader,
                Severity::Warning,
                StatusMessages::READER_NOT_READY,
            );
            return Err(HardwareError::not_ready("tag write").into());
        }

        let timeout = port.write_timeout();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match port.poll().await {
                PollOutcome::Tag(uid) => {
                    debug!(tag_uid = %uid, "tag presented for writing");
                    return Ok(uid);
                }
                PollOutcome::NoTag => {}
                PollOutcome::Disconnected => {
                    return Err(HardwareError::disconnected("reader lost while waiting for tag").into());
                }
            }
        }
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Err(HardwareError::write_timeout(millis).into())
    }

    async fn display_name(&self, guest_id: &GuestId) -> String {
        self.snapshots
            .guest_name(guest_id)
            .await
            .unwrap_or_else(|| guest_id.to_string())
    }

    /// Guest bound to `tag_uid`.
    pub async fn lookup(&self, tag_uid: &TagUid) -> Option<GuestId> {
        self.registry.lookup(tag_uid).await
    }

    /// Display name from the cached directory snapshot.
    pub async fn guest_name(&self, guest_id: &GuestId) -> Option<String> {
        self.snapshots.guest_name(guest_id).await
    }

    /// Check-ins not yet confirmed by the directory.
    pub async fn pending_count(&self) -> usize {
        self.ledger.pending_count().await
    }

    /// Next entries the coordinator will try, in drain order.
    pub async fn pending_entries(&self, limit: usize) -> Vec<CheckInEntry> {
        self.ledger.pending_entries(limit).await
    }

    /// Run a sync cycle right away.
    ///
    /// # Errors
    ///
    /// Returns an error only if local storage fails.
    pub async fn sync_now(&self) -> StationResult<rollcall_sync::CycleReport> {
        Ok(self.sync.run_cycle().await?)
    }

    /// Drop every unsynced check-in. Operator action.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    pub async fn clear_queue(&self) -> StationResult<usize> {
        let cleared = self.ledger.clear_queue().await?;
        self.bus.emit(
            StatusKind::Sync,
            Severity::Warning,
            StatusMessages::queue_cleared(cleared),
        );
        Ok(cleared)
    }

    pub async fn status(&self) -> StationStatus {
        StationStatus {
            station: self.station().await.name().to_string(),
            reader_ready: self.reader_ready(),
            registry_degraded: self.registry.is_degraded(),
            registered_tags: self.registry.len().await,
            sync: self.sync.status().await,
        }
    }
}
