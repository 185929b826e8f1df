//! On-disk cache of the last remote directory snapshot.
//!
//! Lets a station show guest names and remote cell states while offline.
//! The cache is advisory: a missing or unreadable file simply means no
//! snapshot, never an error at startup.

use crate::config::StorageConfig;
use crate::error::StorageResult;
use crate::fs::{atomic_write, ensure_dir, read_optional};
use chrono::{DateTime, Utc};
use rollcall_core::constants::SCHEMA_VERSION;
use rollcall_core::{CellUpdate, DirectorySnapshot, GuestId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    snapshot: DirectorySnapshot,
}

/// Last known copy of the remote guest directory.
#[derive(Debug)]
pub struct SnapshotCache {
    path: PathBuf,
    current: RwLock<Option<DirectorySnapshot>>,
}

impl SnapshotCache {
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        ensure_dir(config.data_dir()).await?;
        let path = config.snapshot_path();

        let current = match read_optional(&path).await? {
            Some(bytes) => match serde_json::from_slice::<SnapshotFile>(&bytes) {
                Ok(file) => {
                    debug!(guests = file.snapshot.guests.len(), "snapshot cache loaded");
                    Some(file.snapshot)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable snapshot cache");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    /// Replace the cached snapshot.
    pub async fn store(&self, snapshot: DirectorySnapshot) -> StorageResult<()> {
        let mut current = self.current.write().await;
        let file = SnapshotFile {
            version: SCHEMA_VERSION,
            snapshot,
        };
        atomic_write(&self.path, &serde_json::to_vec(&file)?).await?;
        *current = Some(file.snapshot);
        Ok(())
    }

    /// Fold confirmed writes into the cached snapshot.
    pub async fn apply(&self, updates: &[CellUpdate]) -> StorageResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut current = self.current.write().await;
        let Some(mut snapshot) = current.clone() else {
            return Ok(());
        };
        for update in updates {
            snapshot.apply(update);
        }

        let file = SnapshotFile {
            version: SCHEMA_VERSION,
            snapshot,
        };
        atomic_write(&self.path, &serde_json::to_vec(&file)?).await?;
        *current = Some(file.snapshot);
        Ok(())
    }

    pub async fn get(&self) -> Option<DirectorySnapshot> {
        self.current.read().await.clone()
    }

    /// Display name of `guest_id`, if the snapshot knows it.
    pub async fn guest_name(&self, guest_id: &GuestId) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .and_then(|s| s.guest(guest_id))
            .map(|g| g.name.clone())
            .filter(|name| !name.is_empty())
    }

    /// When the cached snapshot was fetched.
    pub async fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.as_ref().map(|s| s.fetched_at)
    }
}
