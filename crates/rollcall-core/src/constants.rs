//! Tuning constants shared by the reader port, the local stores and the
//! sync coordinator.
//!
//! Every value here is a default; the configuration structs in the other
//! crates take these as their `Default` and allow overriding them.
//!
//! ```
//! use rollcall_core::constants::*;
//! use std::time::Duration;
//!
//! let poll = Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS);
//! let write = Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS);
//! assert!(write > poll);
//! ```

// ============================================================================
// Hardware Reader Port
// ============================================================================

/// Default timeout for a single tag poll, in milliseconds.
///
/// Kept short so the scan loop stays responsive and cancellable.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 3000;

/// Default timeout for a tag write, in milliseconds.
///
/// Writing is a deliberate, user-initiated action and is allowed to block
/// considerably longer than a poll.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Minimum interval between reconnect probes while a reader is disconnected.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Period of the foreground scan loop between two polls.
pub const DEFAULT_SCAN_PERIOD_MS: u64 = 250;

/// Minimum tag UID length in bytes.
///
/// Short UIDs (2 bytes) are accepted because some readers truncate the
/// identifier of legacy tags.
pub const MIN_TAG_UID_BYTES: usize = 2;

/// Maximum tag UID length in bytes (ISO 14443 triple-size UID).
pub const MAX_TAG_UID_BYTES: usize = 10;

// ============================================================================
// Attendance Ledger
// ============================================================================

/// Window in which repeated scans of the same guest at the same station
/// collapse into one check-in, in seconds.
pub const DEFAULT_DEBOUNCE_WINDOW_SECS: u64 = 5;

/// Age after which synced entries leave the active ledger on compaction.
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// Sync Coordinator
// ============================================================================

/// Interval between two scheduled sync cycles, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// Maximum number of ledger entries drained per cycle.
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 20;

/// First retry delay after a failed remote write, in seconds.
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 5;

/// Upper bound of the retry delay, in seconds.
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Interval of the background connectivity probe, in seconds.
pub const DEFAULT_CONNECTIVITY_PROBE_SECS: u64 = 15;

// ============================================================================
// Remote Guest Directory
// ============================================================================

/// Cell value marking a guest as explicitly absent at a station.
pub const ABSENT_SENTINEL: &str = "ABSENT";

/// Default request budget against the remote spreadsheet API.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default timeout of a single remote request, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8000;

// ============================================================================
// Local state layout
// ============================================================================

/// Tag registry file name inside the data directory.
pub const REGISTRY_FILE: &str = "registry.json";

/// Attendance ledger file name inside the data directory.
pub const LEDGER_FILE: &str = "checkins.jsonl";

/// Archive of compacted ledger entries.
pub const LEDGER_ARCHIVE_FILE: &str = "checkins.archive.jsonl";

/// Cached remote snapshot file name.
pub const SNAPSHOT_FILE: &str = "directory_snapshot.json";

/// Current on-disk schema version of the registry and snapshot files.
pub const SCHEMA_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_ordered() {
        assert!(DEFAULT_POLL_TIMEOUT_MS <= 5000);
        assert!(DEFAULT_WRITE_TIMEOUT_MS > DEFAULT_POLL_TIMEOUT_MS);
    }

    #[test]
    fn test_backoff_bounds() {
        assert!(DEFAULT_BACKOFF_BASE_SECS < DEFAULT_BACKOFF_MAX_SECS);
    }

    #[test]
    fn test_uid_bounds() {
        assert!(MIN_TAG_UID_BYTES < MAX_TAG_UID_BYTES);
    }
}
