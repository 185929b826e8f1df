//! In-memory guest directory.
//!
//! Holds the guest table in process and lets tests simulate the failure
//! modes of the real directory: going offline, quota errors and per-guest
//! rejections. The binary's `--offline` mode runs against one that is
//! permanently disconnected.

use crate::directory::{CellStatus, GuestDirectory};
use crate::error::{DirectoryError, DirectoryResult};
use chrono::Utc;
use rollcall_core::{CellUpdate, CellValue, DirectorySnapshot, GuestId, GuestRecord, Station};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    guests: Mutex<Vec<GuestRecord>>,
    rejected_guests: Mutex<HashSet<GuestId>>,
    offline: AtomicBool,
    quota_failures: AtomicU32,
    fetches: AtomicUsize,
    batches: AtomicUsize,
    cells_written: AtomicUsize,
}

/// Shared, clonable in-memory [`GuestDirectory`].
///
/// Clones observe the same table, so a test can keep one clone for
/// inspection while the coordinator owns another.
///
/// ```
/// use rollcall_network::{GuestDirectory, MemoryDirectory};
/// use rollcall_core::{GuestId, GuestRecord};
///
/// # #[tokio::main]
/// # async fn main() {
/// let directory = MemoryDirectory::with_guests(vec![GuestRecord::new(GuestId::from(1001), "Ada")]);
/// directory.set_online(false);
/// assert!(directory.fetch_snapshot().await.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    inner: Arc<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guests(guests: Vec<GuestRecord>) -> Self {
        let directory = Self::new();
        *directory.lock_guests() = guests;
        directory
    }

    fn lock_guests(&self) -> std::sync::MutexGuard<'_, Vec<GuestRecord>> {
        self.inner
            .guests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_rejected(&self) -> std::sync::MutexGuard<'_, HashSet<GuestId>> {
        self.inner
            .rejected_guests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> DirectoryResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(DirectoryError::unavailable("directory offline"));
        }
        Ok(())
    }

    /// Simulate losing or regaining connectivity.
    pub fn set_online(&self, online: bool) {
        self.inner.offline.store(!online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        !self.inner.offline.load(Ordering::SeqCst)
    }

    /// Fail the next `count` batch writes with `QuotaExceeded`.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.quota_failures.store(count, Ordering::SeqCst);
    }

    /// Reject every cell written for `guest_id` until cleared.
    pub fn reject_guest(&self, guest_id: GuestId) {
        self.lock_rejected().insert(guest_id);
    }

    pub fn clear_rejections(&self) {
        self.lock_rejected().clear();
    }

    pub fn upsert_guest(&self, guest: GuestRecord) {
        let mut guests = self.lock_guests();
        match guests.iter_mut().find(|g| g.guest_id == guest.guest_id) {
            Some(existing) => *existing = guest,
            None => guests.push(guest),
        }
    }

    /// Set a cell directly, as another station would.
    pub fn set_cell(&self, guest_id: &GuestId, station: &Station, value: CellValue) {
        let mut guests = self.lock_guests();
        if let Some(guest) = guests.iter_mut().find(|g| &g.guest_id == guest_id) {
            guest.stations.insert(station.key().to_string(), value);
        }
    }

    pub fn cell(&self, guest_id: &GuestId, station: &Station) -> Option<CellValue> {
        self.lock_guests()
            .iter()
            .find(|g| &g.guest_id == guest_id)
            .map(|g| g.cell(station))
    }

    /// Number of snapshot fetches served.
    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    /// Number of batch writes that reached the table.
    pub fn batch_count(&self) -> usize {
        self.inner.batches.load(Ordering::SeqCst)
    }

    /// Number of individual cells written.
    pub fn cells_written(&self) -> usize {
        self.inner.cells_written.load(Ordering::SeqCst)
    }
}

impl GuestDirectory for MemoryDirectory {
    async fn fetch_snapshot(&self) -> DirectoryResult<DirectorySnapshot> {
        self.check_online()?;
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(DirectorySnapshot::new(Utc::now(), self.lock_guests().clone()))
    }

    async fn write_cells(&self, updates: &[CellUpdate]) -> DirectoryResult<Vec<CellStatus>> {
        self.check_online()?;

        let quota = self
            .inner
            .quota_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if quota.is_ok() {
            return Err(DirectoryError::QuotaExceeded);
        }

        let rejected = self.lock_rejected().clone();
        let mut guests = self.lock_guests();
        let statuses: Vec<CellStatus> = updates
            .iter()
            .map(|update| {
                if rejected.contains(&update.guest_id) {
                    return CellStatus::Rejected(format!("guest {} is locked", update.guest_id));
                }
                match guests.iter_mut().find(|g| g.guest_id == update.guest_id) {
                    Some(guest) => {
                        guest
                            .stations
                            .insert(update.station.key().to_string(), update.value.clone());
                        CellStatus::Written
                    }
                    None => CellStatus::Rejected(format!("unknown guest {}", update.guest_id)),
                }
            })
            .collect();

        let written = statuses.iter().filter(|s| s.is_written()).count();
        self.inner.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.cells_written.fetch_add(written, Ordering::SeqCst);
        debug!(cells = updates.len(), written, "memory directory batch");
        Ok(statuses)
    }

    async fn ping(&self) -> DirectoryResult<()> {
        self.check_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reception() -> Station {
        Station::new("Reception").unwrap()
    }

    fn directory() -> MemoryDirectory {
        MemoryDirectory::with_guests(vec![
            GuestRecord::new(GuestId::from(1001), "Ada"),
            GuestRecord::new(GuestId::from(1002), "Alan"),
        ])
    }

    #[tokio::test]
    async fn test_write_then_fetch() {
        let directory = directory();
        let statuses = directory
            .write_cells(&[CellUpdate::new(
                GuestId::from(1001),
                reception(),
                CellValue::Absent,
            )])
            .await
            .unwrap();

        assert_eq!(statuses, vec![CellStatus::Written]);
        let snapshot = directory.fetch_snapshot().await.unwrap();
        assert_eq!(
            snapshot.cell(&GuestId::from(1001), &reception()),
            Some(CellValue::Absent)
        );
        assert_eq!(directory.cells_written(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let directory = directory();
        directory.set_online(false);

        assert!(directory.ping().await.unwrap_err().is_offline());
        assert!(directory.fetch_snapshot().await.is_err());
        assert!(directory.write_cells(&[]).await.is_err());
        assert_eq!(directory.fetch_count(), 0);

        directory.set_online(true);
        assert!(directory.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_quota_failures_are_consumed() {
        let directory = directory();
        directory.fail_next_writes(1);
        let update = CellUpdate::new(GuestId::from(1001), reception(), CellValue::Absent);

        assert!(matches!(
            directory.write_cells(std::slice::from_ref(&update)).await,
            Err(DirectoryError::QuotaExceeded)
        ));
        assert!(directory.write_cells(&[update]).await.is_ok());
        assert_eq!(directory.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_rejection() {
        let directory = directory();
        directory.reject_guest(GuestId::from(1002));

        let statuses = directory
            .write_cells(&[
                CellUpdate::new(GuestId::from(1001), reception(), CellValue::Absent),
                CellUpdate::new(GuestId::from(1002), reception(), CellValue::Absent),
                CellUpdate::new(GuestId::from(9999), reception(), CellValue::Absent),
            ])
            .await
            .unwrap();

        assert!(statuses[0].is_written());
        assert!(!statuses[1].is_written());
        assert!(!statuses[2].is_written());
        assert_eq!(
            directory.cell(&GuestId::from(1002), &reception()),
            Some(CellValue::Empty)
        );
    }
}
