//! Sync coordinator for the rollcall attendance system.
//!
//! [`SyncCoordinator`] drains the local [`AttendanceLedger`] into the
//! shared guest directory. Check-ins are always recorded locally first; the
//! coordinator only decides when and what to write remotely:
//!
//! - cycles run on a fixed interval, on demand, and as soon as a
//!   connectivity probe succeeds after an outage
//! - earliest check-in wins when another station got there first
//! - failed writes are retried with exponential [`Backoff`], never dropped
//!
//! [`AttendanceLedger`]: rollcall_storage::AttendanceLedger
//!
//! # Example
//!
//! ```no_run
//! use rollcall_network::MemoryDirectory;
//! use rollcall_storage::{AttendanceLedger, SnapshotCache, StorageConfig};
//! use rollcall_sync::{SyncConfig, SyncCoordinator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = StorageConfig::new("/var/lib/rollcall");
//! let coordinator = SyncCoordinator::new(
//!     MemoryDirectory::new(),
//!     Arc::new(AttendanceLedger::open(&storage).await?),
//!     Arc::new(SnapshotCache::open(&storage).await?),
//!     SyncConfig::default(),
//! );
//!
//! let report = coordinator.run_cycle().await?;
//! println!("synced {}", report.synced());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod status;

pub use backoff::Backoff;
pub use config::SyncConfig;
pub use coordinator::{Resolution, SyncCoordinator, resolve};
pub use error::{SyncError, SyncResult};
pub use status::{CycleOutcome, CycleReport, SyncPhase, SyncStatus};
