//! Local persistence for the rollcall attendance system.
//!
//! Everything a station needs to keep working offline lives in plain files
//! under one data directory:
//!
//! - [`TagRegistry`] - `registry.json`, the tag → guest mapping, replaced
//!   atomically on every change with a `.backup` copy alongside
//! - [`AttendanceLedger`] - `checkins.jsonl`, the append-only check-in
//!   journal with per-entry sync state
//! - [`SnapshotCache`] - `directory_snapshot.json`, the last fetched copy of
//!   the remote guest directory
//!
//! # Guarantees
//!
//! - A check-in is on disk before [`AttendanceLedger::append`] returns, so a
//!   crash right after a scan never loses it.
//! - Repeated scans of the same guest at the same station within the
//!   debounce window yield one entry.
//! - A tag bound to one guest is never silently reassigned; see
//!   [`TagRegistry::register`].
//! - A damaged registry is recovered from its backup instead of failing
//!   startup.
//!
//! # Examples
//!
//! ```no_run
//! use rollcall_storage::{AttendanceLedger, StorageConfig, TagRegistry};
//! use rollcall_core::{AttendanceMark, GuestId, Station, TagUid};
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("/var/lib/rollcall");
//! let registry = TagRegistry::open(&config).await?;
//! let ledger = AttendanceLedger::open(&config).await?;
//!
//! registry.register(TagUid::new("04A1")?, GuestId::from(1001)).await?;
//!
//! if let Some(guest) = registry.lookup(&TagUid::new("04A1")?).await {
//!     ledger
//!         .append(guest, Station::new("Reception")?, AttendanceMark::Present, Utc::now())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod ledger;
pub mod messages;
pub mod models;
pub mod registry;
pub mod snapshot;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use ledger::{AppendOutcome, AttendanceLedger, CompactionReport, LedgerCounts};
pub use messages::StatusMessages;
pub use models::{CheckInEntry, SyncState, TagBinding};
pub use registry::{RegistrySource, TagRegistry};
pub use snapshot::SnapshotCache;
