//! Station errors

use rollcall_hardware::HardwareError;
use rollcall_storage::StorageError;
use rollcall_sync::SyncError;
use thiserror::Error;

pub type StationResult<T> = std::result::Result<T, StationError>;

#[derive(Debug, Error)]
pub enum StationError {
    /// Reader missing, timed out, or the tag refused the write
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Registry or ledger failure, including the binding conflicts
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Station name rejected
    #[error(transparent)]
    Core(#[from] rollcall_core::Error),
}

impl StationError {
    /// Whether the error is the fail-closed refusal to rebind a tag.
    pub fn is_already_registered(&self) -> bool {
        matches!(self, Self::Storage(StorageError::AlreadyRegistered { .. }))
    }

    /// Whether the error is a refusal that `rewrite_tag` would resolve: the
    /// tag belongs to someone else or the guest already holds another tag.
    pub fn is_binding_conflict(&self) -> bool {
        matches!(
            self,
            Self::Storage(
                StorageError::AlreadyRegistered { .. } | StorageError::GuestAlreadyBound { .. }
            )
        )
    }
}
