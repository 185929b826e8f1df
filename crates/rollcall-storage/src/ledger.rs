//! Attendance ledger: append-only, crash-safe record of check-ins.
//!
//! The ledger is a JSON Lines journal. Every mutation is one record synced
//! to disk before the call returns, and the in-memory view is rebuilt by
//! replaying the journal on open:
//!
//! ```text
//! {"op":"append","entry":{"entry_id":"…","guest_id":"1001","station":"Reception",…}}
//! {"op":"failed","entry_id":"…","at":"…","attempts":1,"error":"timeout"}
//! {"op":"retry","entry_id":"…"}
//! {"op":"synced","entry_id":"…","at":"…"}
//! ```
//!
//! Compaction rewrites the journal as one `append` record per live entry and
//! moves old synced entries to the archive file.

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::fs::{append_lines, atomic_write, ensure_dir, read_optional};
use crate::models::{CheckInEntry, SyncState};
use chrono::{DateTime, Duration, Utc};
use rollcall_core::{AttendanceMark, GuestId, Station};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LedgerRecord {
    Append {
        entry: CheckInEntry,
    },
    Synced {
        entry_id: Uuid,
        at: DateTime<Utc>,
    },
    Failed {
        entry_id: Uuid,
        at: DateTime<Utc>,
        attempts: u32,
        error: String,
    },
    Retry {
        entry_id: Uuid,
    },
    Cleared {
        entry_ids: Vec<Uuid>,
        at: DateTime<Utc>,
    },
}

/// Result of [`AttendanceLedger::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new entry was recorded.
    Recorded(CheckInEntry),

    /// A matching entry inside the debounce window already exists.
    Debounced(CheckInEntry),
}

impl AppendOutcome {
    pub fn entry(&self) -> &CheckInEntry {
        match self {
            Self::Recorded(entry) | Self::Debounced(entry) => entry,
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Entry counts by sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub pending: usize,
    pub failed: usize,
    pub synced: usize,
}

impl LedgerCounts {
    /// Entries not yet confirmed remotely.
    pub fn outstanding(&self) -> usize {
        self.pending + self.failed
    }
}

/// Outcome of a compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Entries moved to the archive.
    pub archived: usize,

    /// Entries left in the active journal.
    pub retained: usize,
}

/// Durable, debounced check-in journal.
#[derive(Debug)]
pub struct AttendanceLedger {
    path: PathBuf,
    archive_path: PathBuf,
    debounce_window: Duration,
    retention: Duration,
    entries: Mutex<Vec<CheckInEntry>>,
}

impl AttendanceLedger {
    /// Open (or create) the ledger of the configured data directory.
    ///
    /// A torn or malformed line, typically the tail of a write cut short by
    /// a crash, is skipped with a warning and the journal is rewritten
    /// without it.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        ensure_dir(config.data_dir()).await?;

        let path = config.ledger_path();
        let (entries, skipped) = replay(&path).await?;

        let ledger = Self {
            path,
            archive_path: config.archive_path(),
            debounce_window: config.debounce_window_duration(),
            retention: config.retention_duration(),
            entries: Mutex::new(entries),
        };

        if skipped > 0 {
            let entries = ledger.entries.lock().await;
            warn!(skipped, path = %ledger.path.display(), "ledger repaired");
            ledger.rewrite(&entries).await?;
        }

        let counts = ledger.counts().await;
        debug!(
            pending = counts.pending,
            failed = counts.failed,
            synced = counts.synced,
            "ledger opened"
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an attendance fact.
    ///
    /// When the latest entry for the same guest, station and mark lies
    /// within the debounce window of `detected_at`, nothing is written and
    /// that entry is returned as [`AppendOutcome::Debounced`].
    pub async fn append(
        &self,
        guest_id: GuestId,
        station: Station,
        mark: AttendanceMark,
        detected_at: DateTime<Utc>,
    ) -> StorageResult<AppendOutcome> {
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries
            .iter()
            .rev()
            .find(|e| e.same_subject(&guest_id, &station, mark))
            && (detected_at - existing.detected_at).abs() <= self.debounce_window
        {
            debug!(guest_id = %guest_id, station = %station, entry_id = %existing.entry_id,
                "scan debounced");
            return Ok(AppendOutcome::Debounced(existing.clone()));
        }

        let entry = CheckInEntry::new(guest_id, station, mark, detected_at);
        self.write(&[LedgerRecord::Append {
            entry: entry.clone(),
        }])
        .await?;
        entries.push(entry.clone());

        info!(entry_id = %entry.entry_id, guest_id = %entry.guest_id, station = %entry.station,
            mark = entry.mark.display_name(), "check-in recorded");
        Ok(AppendOutcome::Recorded(entry))
    }

    /// Up to `limit` pending entries, fewest attempts first, then oldest.
    pub async fn pending_entries(&self, limit: usize) -> Vec<CheckInEntry> {
        let entries = self.entries.lock().await;
        let mut pending: Vec<_> = entries
            .iter()
            .filter(|e| e.sync_state == SyncState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|e| (e.sync_attempts, e.detected_at));
        pending.truncate(limit);
        pending
    }

    /// Move failed entries whose backoff has elapsed back to pending.
    ///
    /// `delay` maps an attempt count to the wait after the last attempt.
    pub async fn promote_due<F>(&self, now: DateTime<Utc>, delay: F) -> StorageResult<usize>
    where
        F: Fn(u32) -> Duration,
    {
        let mut entries = self.entries.lock().await;

        let due: Vec<Uuid> = entries
            .iter()
            .filter(|e| e.sync_state == SyncState::Failed)
            .filter(|e| {
                e.last_attempt_at
                    .is_none_or(|last| last + delay(e.sync_attempts) <= now)
            })
            .map(|e| e.entry_id)
            .collect();

        if due.is_empty() {
            return Ok(0);
        }

        let records: Vec<_> = due
            .iter()
            .map(|id| LedgerRecord::Retry { entry_id: *id })
            .collect();
        self.write(&records).await?;

        for entry in entries.iter_mut().filter(|e| due.contains(&e.entry_id)) {
            entry.sync_state = SyncState::Pending;
        }

        debug!(count = due.len(), "failed entries due for retry");
        Ok(due.len())
    }

    /// Mark an entry as confirmed by the remote directory.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown entry id.
    pub async fn mark_synced(&self, entry_id: Uuid) -> StorageResult<()> {
        let mut entries = self.entries.lock().await;
        let entry = find_mut(&mut entries, entry_id)?;

        if entry.is_synced() {
            return Ok(());
        }

        self.write(&[LedgerRecord::Synced {
            entry_id,
            at: Utc::now(),
        }])
        .await?;
        entry.sync_state = SyncState::Synced;
        entry.last_error = None;

        debug!(entry_id = %entry_id, "entry synced");
        Ok(())
    }

    /// Record a failed remote write and return the new attempt count.
    ///
    /// Synced entries are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown entry id.
    pub async fn mark_failed(
        &self,
        entry_id: Uuid,
        error: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<u32> {
        let mut entries = self.entries.lock().await;
        let entry = find_mut(&mut entries, entry_id)?;

        if entry.is_synced() {
            debug!(entry_id = %entry_id, "ignoring failure for synced entry");
            return Ok(entry.sync_attempts);
        }

        let attempts = entry.sync_attempts.saturating_add(1);
        self.write(&[LedgerRecord::Failed {
            entry_id,
            at,
            attempts,
            error: error.to_string(),
        }])
        .await?;
        entry.sync_state = SyncState::Failed;
        entry.sync_attempts = attempts;
        entry.last_attempt_at = Some(at);
        entry.last_error = Some(error.to_string());

        debug!(entry_id = %entry_id, attempts, %error, "entry sync failed");
        Ok(attempts)
    }

    pub async fn get(&self, entry_id: Uuid) -> Option<CheckInEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned()
    }

    /// Every live entry in append order.
    pub async fn entries(&self) -> Vec<CheckInEntry> {
        self.entries.lock().await.clone()
    }

    /// Entries not yet confirmed remotely (pending or failed).
    pub async fn pending_count(&self) -> usize {
        self.counts().await.outstanding()
    }

    pub async fn counts(&self) -> LedgerCounts {
        let entries = self.entries.lock().await;
        let mut counts = LedgerCounts::default();
        for entry in entries.iter() {
            match entry.sync_state {
                SyncState::Pending => counts.pending += 1,
                SyncState::Failed => counts.failed += 1,
                SyncState::Synced => counts.synced += 1,
            }
        }
        counts
    }

    /// Archive synced entries detected before `now - retention`.
    pub async fn compact(&self, now: DateTime<Utc>) -> StorageResult<CompactionReport> {
        let mut entries = self.entries.lock().await;
        let cutoff = now - self.retention;

        let (archived, retained): (Vec<_>, Vec<_>) = entries
            .iter()
            .cloned()
            .partition(|e| e.is_synced() && e.detected_at < cutoff);

        if !archived.is_empty() {
            let lines = archived
                .iter()
                .map(|entry| {
                    serde_json::to_string(&LedgerRecord::Append {
                        entry: entry.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            append_lines(&self.archive_path, &lines).await?;
        }

        self.rewrite(&retained).await?;

        let report = CompactionReport {
            archived: archived.len(),
            retained: retained.len(),
        };
        *entries = retained;

        info!(
            archived = report.archived,
            retained = report.retained,
            "ledger compacted"
        );
        Ok(report)
    }

    /// Drop every entry that is not synced. Returns how many were dropped.
    ///
    /// This is the only way pending or failed entries leave the ledger.
    pub async fn clear_queue(&self) -> StorageResult<usize> {
        let mut entries = self.entries.lock().await;

        let cleared: Vec<Uuid> = entries
            .iter()
            .filter(|e| e.is_outstanding())
            .map(|e| e.entry_id)
            .collect();

        if cleared.is_empty() {
            return Ok(0);
        }

        let count = cleared.len();
        self.write(&[LedgerRecord::Cleared {
            entry_ids: cleared,
            at: Utc::now(),
        }])
        .await?;
        entries.retain(|e| e.is_synced());

        warn!(count, "pending check-ins cleared by operator");
        Ok(count)
    }

    async fn write(&self, records: &[LedgerRecord]) -> StorageResult<()> {
        let lines = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        append_lines(&self.path, &lines).await
    }

    async fn rewrite(&self, entries: &[CheckInEntry]) -> StorageResult<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(
                &mut buf,
                &LedgerRecord::Append {
                    entry: entry.clone(),
                },
            )?;
            buf.push(b'\n');
        }
        atomic_write(&self.path, &buf).await
    }
}

fn find_mut(entries: &mut [CheckInEntry], entry_id: Uuid) -> StorageResult<&mut CheckInEntry> {
    entries
        .iter_mut()
        .find(|e| e.entry_id == entry_id)
        .ok_or_else(|| StorageError::not_found("entry", "entry_id", entry_id))
}

/// Rebuild the entry list from the journal. Returns the entries and the
/// number of lines that could not be parsed.
async fn replay(path: &Path) -> StorageResult<(Vec<CheckInEntry>, usize)> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok((Vec::new(), 0));
    };

    let text = String::from_utf8_lossy(&bytes);
    let mut entries: Vec<CheckInEntry> = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<LedgerRecord>(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping unreadable ledger line");
                skipped += 1;
                continue;
            }
        };

        match record {
            LedgerRecord::Append { entry } => {
                if !entries.iter().any(|e| e.entry_id == entry.entry_id) {
                    entries.push(entry);
                }
            }
            LedgerRecord::Synced { entry_id, .. } => {
                if let Some(entry) = entries.iter_mut().find(|e| e.entry_id == entry_id) {
                    entry.sync_state = SyncState::Synced;
                    entry.last_error = None;
                }
            }
            LedgerRecord::Failed {
                entry_id,
                at,
                attempts,
                error,
            } => {
                if let Some(entry) = entries
                    .iter_mut()
                    .find(|e| e.entry_id == entry_id && !e.is_synced())
                {
                    entry.sync_state = SyncState::Failed;
                    entry.sync_attempts = attempts;
                    entry.last_attempt_at = Some(at);
                    entry.last_error = Some(error);
                }
            }
            LedgerRecord::Retry { entry_id } => {
                if let Some(entry) = entries
                    .iter_mut()
                    .find(|e| e.entry_id == entry_id && e.sync_state == SyncState::Failed)
                {
                    entry.sync_state = SyncState::Pending;
                }
            }
            LedgerRecord::Cleared { entry_ids, .. } => {
                entries.retain(|e| e.is_synced() || !entry_ids.contains(&e.entry_id));
            }
        }
    }

    // a crash can leave a partial line without its newline
    if !bytes.is_empty() && !bytes.ends_with(b"\n") && skipped == 0 {
        skipped = 1;
    }

    Ok((entries, skipped))
}
