//! Sync coordinator errors
//!
//! Remote failures are not errors here: an unreachable or refusing
//! directory is a normal outcome of a cycle and shows up in its
//! [`CycleReport`](crate::CycleReport). Only local storage failures abort a
//! cycle.

use rollcall_storage::StorageError;
use thiserror::Error;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Ledger or snapshot cache could not be updated
    #[error(transparent)]
    Storage(#[from] StorageError),
}
