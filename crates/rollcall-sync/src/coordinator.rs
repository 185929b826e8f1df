//! Sync coordinator: drains the attendance ledger into the guest directory.
//!
//! One cycle:
//!
//! 1. **Fetching** - read the directory snapshot and cache it. If the
//!    directory cannot be read the cycle stops here; entries stay queued
//!    with their attempt counts untouched.
//! 2. **Draining** - promote failed entries whose backoff has elapsed, then
//!    take a bounded batch of pending entries.
//! 3. **Writing** - resolve each entry against the snapshot, write the
//!    cells that need writing as one batch, and record the results.
//!
//! # Conflict rule
//!
//! For a check-in, the earliest timestamp wins. If the directory already
//! holds a check-in at or before the local one, the entry is marked synced
//! without writing. A later remote check-in, an empty cell or an absent
//! mark is overwritten. Text typed into a cell by hand counts as a
//! check-in already recorded. Absent marks are operator overrides and are
//! written unless the cell already says absent.
//!
//! Entries of one batch that address the same cell are folded in detection
//! order before anything is sent, so each cell is written at most once per
//! cycle and the outcome does not depend on how entries fall into batches.
//! Entries whose value lost to another entry of the batch share the outcome
//! of the winning write.
//!
//! Cycles are serialized, so a manual sync and the background loop never
//! interleave writes for the same entries.

use crate::backoff::Backoff;
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::status::{CycleReport, SyncPhase, SyncStatus};
use chrono::{DateTime, Utc};
use rollcall_core::{
    AttendanceMark, CellUpdate, CellValue, DirectorySnapshot, GuestId, Severity, StatusBus,
    StatusKind,
};
use rollcall_network::{CellStatus, DirectoryError, GuestDirectory};
use rollcall_storage::{AttendanceLedger, CheckInEntry, SnapshotCache, StatusMessages};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to do with one pending entry given the remote cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Send this cell to the directory.
    Write(CellUpdate),

    /// The directory already holds this fact (or an earlier one).
    AlreadyRecorded,
}

/// Decide whether `entry` must be written, given the directory's current cell.
///
/// `remote` is `None` when the guest is missing from the snapshot; the
/// write is attempted anyway and the directory decides.
pub fn resolve(entry: &CheckInEntry, remote: Option<CellValue>) -> Resolution {
    let already = match (entry.mark, remote) {
        (AttendanceMark::Present, Some(CellValue::CheckedIn(remote_at))) => {
            remote_at <= entry.detected_at
        }
        (AttendanceMark::Present, Some(CellValue::Unrecognized(_))) => true,
        (AttendanceMark::Absent, Some(CellValue::Absent)) => true,
        _ => false,
    };

    if already {
        Resolution::AlreadyRecorded
    } else {
        Resolution::Write(CellUpdate::new(
            entry.guest_id.clone(),
            entry.station.clone(),
            entry.cell_value(),
        ))
    }
}

/// One cell write planned for a batch.
#[derive(Debug)]
struct CellPlan {
    winner: CheckInEntry,
    update: CellUpdate,

    /// Entries of the batch the winning value already covers.
    covered: Vec<CheckInEntry>,
}

impl CellPlan {
    fn entries(&self) -> impl Iterator<Item = &CheckInEntry> {
        std::iter::once(&self.winner).chain(&self.covered)
    }
}

/// Background process that keeps the directory in step with the ledger.
#[derive(Debug)]
pub struct SyncCoordinator<D> {
    directory: D,
    ledger: Arc<AttendanceLedger>,
    snapshots: Arc<SnapshotCache>,
    config: SyncConfig,
    backoff: Backoff,
    state: RwLock<SyncStatus>,
    cycle: Mutex<()>,
    wake: Notify,
    bus: Option<StatusBus>,
}

impl<D: GuestDirectory> SyncCoordinator<D> {
    pub fn new(
        directory: D,
        ledger: Arc<AttendanceLedger>,
        snapshots: Arc<SnapshotCache>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backoff: config.backoff(),
            directory,
            ledger,
            snapshots,
            config,
            state: RwLock::new(SyncStatus::default()),
            cycle: Mutex::new(()),
            wake: Notify::new(),
            bus: None,
        }
    }

    /// Publish offline/online transitions and batch results on `bus`.
    pub fn with_status(mut self, bus: StatusBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Ask the background loop to run a cycle now.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Current phase, connectivity and queue depth.
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.state.read().await.clone();
        let counts = self.ledger.counts().await;
        status.pending = counts.outstanding();
        status.failed = counts.failed;
        status.snapshot_fetched_at = self.snapshots.fetched_at().await;
        status
    }

    /// Run one cycle now.
    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle using `now` for backoff and failure timestamps.
    ///
    /// # Errors
    ///
    /// Only local storage failures are errors. Directory failures end the
    /// cycle with an offline report or mark entries failed.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> SyncResult<CycleReport> {
        let _cycle = self.cycle.lock().await;

        self.set_phase(SyncPhase::Fetching).await;
        let snapshot = match self.directory.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(self.go_offline(&e, now).await),
        };
        self.snapshots.store(snapshot.clone()).await?;
        self.go_online().await;

        self.set_phase(SyncPhase::Draining).await;
        let backoff = self.backoff;
        let promoted = self
            .ledger
            .promote_due(now, |attempts| backoff.chrono_delay(attempts))
            .await?;
        let batch = self.ledger.pending_entries(self.config.batch_size).await;

        let mut report = CycleReport::completed(promoted);
        report.drained = batch.len();
        if !batch.is_empty() {
            self.set_phase(SyncPhase::Writing).await;
            self.write_batch(&snapshot, batch, now, &mut report).await?;
        }

        self.finish_cycle(&report, now).await;
        Ok(report)
    }

    async fn write_batch(
        &self,
        snapshot: &DirectorySnapshot,
        mut batch: Vec<CheckInEntry>,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) -> SyncResult<()> {
        batch.sort_by_key(|e| e.detected_at);

        let mut plans: Vec<CellPlan> = Vec::new();
        let mut planned: HashMap<(GuestId, String), usize> = HashMap::new();

        for entry in batch {
            let key = (entry.guest_id.clone(), entry.station.key().to_string());

            if let Some(&index) = planned.get(&key) {
                let plan = &mut plans[index];
                match resolve(&entry, Some(plan.update.value.clone())) {
                    Resolution::AlreadyRecorded => plan.covered.push(entry),
                    Resolution::Write(update) => {
                        let previous = std::mem::replace(&mut plan.winner, entry);
                        plan.covered.push(previous);
                        plan.update = update;
                    }
                }
                continue;
            }

            match resolve(&entry, snapshot.cell(&entry.guest_id, &entry.station)) {
                Resolution::AlreadyRecorded => {
                    debug!(entry_id = %entry.entry_id, guest_id = %entry.guest_id,
                        station = %entry.station, "directory already holds check-in");
                    self.ledger.mark_synced(entry.entry_id).await?;
                    report.already_recorded += 1;
                }
                Resolution::Write(update) => {
                    planned.insert(key, plans.len());
                    plans.push(CellPlan {
                        winner: entry,
                        update,
                        covered: Vec::new(),
                    });
                }
            }
        }

        if plans.is_empty() {
            return Ok(());
        }

        let updates: Vec<CellUpdate> = plans.iter().map(|p| p.update.clone()).collect();
        let statuses = match self.directory.write_cells(&updates).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, cells = updates.len(), "batch write failed");
                let message = e.to_string();
                for entry in plans.iter().flat_map(CellPlan::entries) {
                    self.ledger
                        .mark_failed(entry.entry_id, &message, now)
                        .await?;
                    report.failed += 1;
                }
                report.error = Some(message);
                if e.is_offline() {
                    self.go_offline(&e, now).await;
                }
                return Ok(());
            }
        };

        let mut confirmed = Vec::new();
        for (plan, status) in plans.into_iter().zip(statuses) {
            match status {
                CellStatus::Written => {
                    for entry in plan.entries() {
                        self.ledger.mark_synced(entry.entry_id).await?;
                    }
                    report.already_recorded += plan.covered.len();
                    confirmed.push(plan.update);
                }
                CellStatus::Rejected(reason) => {
                    for entry in plan.entries() {
                        let attempts = self
                            .ledger
                            .mark_failed(entry.entry_id, &reason, now)
                            .await?;
                        warn!(entry_id = %entry.entry_id, guest_id = %entry.guest_id,
                            attempts, %reason, "cell rejected by directory");
                        report.failed += 1;
                    }
                }
            }
        }

        report.written = confirmed.len();
        self.snapshots.apply(&confirmed).await?;
        Ok(())
    }

    async fn set_phase(&self, phase: SyncPhase) {
        self.state.write().await.phase = phase;
    }

    async fn go_offline(&self, error: &DirectoryError, now: DateTime<Utc>) -> CycleReport {
        let was_online = {
            let mut state = self.state.write().await;
            let was_online = state.online || state.last_cycle_at.is_none();
            state.phase = SyncPhase::Offline;
            state.online = false;
            state.last_cycle_at = Some(now);
            state.last_error = Some(error.to_string());
            was_online
        };

        if was_online {
            warn!(error = %error, "directory unreachable, check-ins stay queued");
            self.emit(Severity::Warning, StatusMessages::OFFLINE);
        } else {
            debug!(error = %error, "directory still unreachable");
        }
        CycleReport::offline(error.to_string())
    }

    async fn go_online(&self) {
        let reconnected = {
            let mut state = self.state.write().await;
            let reconnected = !state.online && state.last_cycle_at.is_some();
            state.online = true;
            reconnected
        };

        if reconnected {
            info!("directory reachable again");
            self.emit(Severity::Info, StatusMessages::BACK_ONLINE);
        }
    }

    async fn finish_cycle(&self, report: &CycleReport, now: DateTime<Utc>) {
        {
            let mut state = self.state.write().await;
            if state.phase != SyncPhase::Offline {
                state.phase = SyncPhase::Idle;
            }
            state.last_cycle_at = Some(now);
            if report.error.is_none() {
                state.last_success_at = Some(now);
                state.last_error = None;
            } else {
                state.last_error.clone_from(&report.error);
            }
        }

        if report.synced() > 0 {
            info!(
                written = report.written,
                already_recorded = report.already_recorded,
                failed = report.failed,
                "sync cycle finished"
            );
            self.emit(Severity::Success, StatusMessages::synced(report.synced()));
        }
        if report.failed > 0 {
            let pending = self.ledger.pending_count().await;
            self.emit(Severity::Warning, StatusMessages::pending(pending));
        }
    }

    fn emit(&self, severity: Severity, message: impl Into<String>) {
        if let Some(bus) = &self.bus {
            bus.emit(StatusKind::Sync, severity, message);
        }
    }

    /// Run cycles until `cancel` fires.
    ///
    /// A cycle runs at every interval tick and whenever [`trigger`](Self::trigger)
    /// is called. While offline the directory is pinged every probe
    /// interval, and a successful ping starts a cycle straight away instead
    /// of waiting for the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut sync_tick = tokio::time::interval(self.config.interval());
        let mut probe_tick = tokio::time::interval(self.config.probe_interval());
        sync_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        probe_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        probe_tick.tick().await;

        info!(
            interval_secs = self.config.interval().as_secs(),
            batch_size = self.config.batch_size,
            "sync loop started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = sync_tick.tick() => {}
                () = self.wake.notified() => {}
                _ = probe_tick.tick() => {
                    if self.state.read().await.online {
                        continue;
                    }
                    if let Err(e) = self.directory.ping().await {
                        debug!(error = %e, "connectivity probe failed");
                        continue;
                    }
                    debug!("connectivity probe succeeded");
                }
            }

            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "sync cycle aborted");
                self.state.write().await.last_error = Some(e.to_string());
            }
        }

        info!("sync loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rollcall_core::{GuestId, Station};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn entry(mark: AttendanceMark, detected_at: DateTime<Utc>) -> CheckInEntry {
        CheckInEntry::new(
            GuestId::from(1001),
            Station::new("Reception").unwrap(),
            mark,
            detected_at,
        )
    }

    #[test]
    fn test_resolve_earliest_check_in_wins() {
        let local = entry(AttendanceMark::Present, at(10));

        assert_eq!(
            resolve(&local, Some(CellValue::CheckedIn(at(0)))),
            Resolution::AlreadyRecorded
        );
        assert_eq!(
            resolve(&local, Some(CellValue::CheckedIn(at(10)))),
            Resolution::AlreadyRecorded
        );
        assert!(matches!(
            resolve(&local, Some(CellValue::CheckedIn(at(20)))),
            Resolution::Write(update) if update.value == CellValue::CheckedIn(at(10))
        ));
    }

    #[test]
    fn test_resolve_present_overrides_absent_and_empty() {
        let local = entry(AttendanceMark::Present, at(10));
        assert!(matches!(
            resolve(&local, Some(CellValue::Absent)),
            Resolution::Write(_)
        ));
        assert!(matches!(
            resolve(&local, Some(CellValue::Empty)),
            Resolution::Write(_)
        ));
        assert!(matches!(resolve(&local, None), Resolution::Write(_)));
    }

    #[test]
    fn test_resolve_hand_typed_cell_counts_as_present() {
        let cell = Some(CellValue::Unrecognized("yes".to_string()));

        assert_eq!(
            resolve(&entry(AttendanceMark::Present, at(10)), cell.clone()),
            Resolution::AlreadyRecorded
        );
        assert!(matches!(
            resolve(&entry(AttendanceMark::Absent, at(10)), cell),
            Resolution::Write(_)
        ));
    }

    #[test]
    fn test_resolve_absent_is_an_override() {
        let local = entry(AttendanceMark::Absent, at(10));
        assert!(matches!(
            resolve(&local, Some(CellValue::CheckedIn(at(0)))),
            Resolution::Write(update) if update.value == CellValue::Absent
        ));
        assert_eq!(
            resolve(&local, Some(CellValue::Absent)),
            Resolution::AlreadyRecorded
        );
    }
}
