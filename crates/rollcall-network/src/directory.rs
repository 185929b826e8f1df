//! Guest directory interface.
//!
//! The remote directory is the spreadsheet every station shares: one row per
//! guest, one column per station. The core only needs three things from it,
//! captured by [`GuestDirectory`]: read the whole table, write a batch of
//! cells, and answer a cheap liveness check.

use crate::client::SheetClient;
use crate::error::DirectoryResult;
use crate::memory::MemoryDirectory;
use rollcall_core::{CellUpdate, DirectorySnapshot};
use std::future::Future;

/// Result of one cell inside a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellStatus {
    /// The directory confirmed the write.
    Written,

    /// The directory refused this cell; the rest of the batch is unaffected.
    Rejected(String),
}

impl CellStatus {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Narrow read/write interface to the remote guest directory.
///
/// Futures are `Send` so a coordinator generic over the directory can run
/// on a spawned task.
///
/// # Errors
///
/// Every method fails with a [`DirectoryError`](crate::DirectoryError) when
/// the directory is unreachable or answers with an error. A batch that the
/// directory accepted but partly refused is `Ok`, with the refusals in the
/// returned statuses.
pub trait GuestDirectory: Send + Sync {
    /// Read the full guest table.
    fn fetch_snapshot(&self) -> impl Future<Output = DirectoryResult<DirectorySnapshot>> + Send;

    /// Write `updates` as one batch.
    ///
    /// Returns one status per update, in the same order.
    fn write_cells(
        &self,
        updates: &[CellUpdate],
    ) -> impl Future<Output = DirectoryResult<Vec<CellStatus>>> + Send;

    /// Lightweight connectivity check.
    fn ping(&self) -> impl Future<Output = DirectoryResult<()>> + Send;
}

/// Any directory implementation, for callers that choose one at runtime.
#[derive(Debug, Clone)]
pub enum AnyDirectory {
    /// HTTP spreadsheet API.
    Sheet(SheetClient),

    /// In-process table; disconnected in the binary's offline mode.
    Memory(MemoryDirectory),
}

impl GuestDirectory for AnyDirectory {
    async fn fetch_snapshot(&self) -> DirectoryResult<DirectorySnapshot> {
        match self {
            Self::Sheet(client) => client.fetch_snapshot().await,
            Self::Memory(memory) => memory.fetch_snapshot().await,
        }
    }

    async fn write_cells(&self, updates: &[CellUpdate]) -> DirectoryResult<Vec<CellStatus>> {
        match self {
            Self::Sheet(client) => client.write_cells(updates).await,
            Self::Memory(memory) => memory.write_cells(updates).await,
        }
    }

    async fn ping(&self) -> DirectoryResult<()> {
        match self {
            Self::Sheet(client) => client.ping().await,
            Self::Memory(memory) => memory.ping().await,
        }
    }
}

impl From<SheetClient> for AnyDirectory {
    fn from(client: SheetClient) -> Self {
        Self::Sheet(client)
    }
}

impl From<MemoryDirectory> for AnyDirectory {
    fn from(memory: MemoryDirectory) -> Self {
        Self::Memory(memory)
    }
}
