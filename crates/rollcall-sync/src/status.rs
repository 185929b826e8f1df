//! Sync cycle phases, per-cycle reports and the status snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the coordinator is in its cycle.
///
/// ```text
/// Idle -> Fetching -> Draining -> Writing -> Idle
///             \
///              -> Offline (fetch failed; cycle ends, entries stay queued)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    Draining,
    Writing,
    Offline,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Draining => "draining",
            Self::Writing => "writing",
            Self::Offline => "offline",
        };
        f.write_str(name)
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Snapshot fetched and the batch (possibly empty) processed.
    Completed,

    /// Snapshot fetch failed; nothing was written.
    Offline,
}

/// What one sync cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,

    /// Failed entries moved back to pending before draining.
    pub promoted: usize,

    /// Entries taken from the ledger this cycle.
    pub drained: usize,

    /// Cells confirmed written by the directory.
    pub written: usize,

    /// Entries marked synced without a write because the directory already
    /// held an equal or earlier fact.
    pub already_recorded: usize,

    /// Entries whose write failed and now wait for a retry.
    pub failed: usize,

    /// Error that ended the cycle early or failed the batch.
    pub error: Option<String>,
}

impl CycleReport {
    pub(crate) fn offline(error: String) -> Self {
        Self {
            outcome: CycleOutcome::Offline,
            promoted: 0,
            drained: 0,
            written: 0,
            already_recorded: 0,
            failed: 0,
            error: Some(error),
        }
    }

    pub(crate) fn completed(promoted: usize) -> Self {
        Self {
            outcome: CycleOutcome::Completed,
            promoted,
            drained: 0,
            written: 0,
            already_recorded: 0,
            failed: 0,
            error: None,
        }
    }

    /// Entries that left the queue this cycle.
    pub fn synced(&self) -> usize {
        self.written + self.already_recorded
    }

    pub fn is_offline(&self) -> bool {
        self.outcome == CycleOutcome::Offline
    }
}

/// Point-in-time view of the coordinator for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,

    /// Whether the last fetch reached the directory. `false` until the first
    /// cycle has run.
    pub online: bool,

    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,

    /// Entries not yet confirmed remotely.
    pub pending: usize,

    /// Of `pending`, how many are waiting out a backoff.
    pub failed: usize,

    /// When the cached directory snapshot was fetched.
    pub snapshot_fetched_at: Option<DateTime<Utc>>,
}
