//! Sync coordinator configuration

use crate::backoff::Backoff;
use rollcall_core::constants::{
    DEFAULT_BACKOFF_BASE_SECS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_CONNECTIVITY_PROBE_SECS,
    DEFAULT_SYNC_BATCH_SIZE, DEFAULT_SYNC_INTERVAL_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling knobs for the sync coordinator
///
/// # Example
///
/// ```
/// use rollcall_sync::SyncConfig;
/// use std::time::Duration;
///
/// let config = SyncConfig::default()
///     .with_interval(Duration::from_secs(10))
///     .with_batch_size(5);
///
/// assert_eq!(config.batch_size, 5);
/// assert_eq!(config.interval(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between scheduled cycles
    pub interval_secs: u64,

    /// Most entries written per cycle
    pub batch_size: usize,

    /// Retry delay after the first failure, in seconds
    pub backoff_base_secs: u64,

    /// Upper bound on the retry delay, in seconds
    pub backoff_max_secs: u64,

    /// Seconds between connectivity probes while offline
    pub probe_interval_secs: u64,
}

impl SyncConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base_secs = base.as_secs();
        self.backoff_max_secs = max.as_secs();
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval_secs = interval.as_secs().max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.backoff_base_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            batch_size: DEFAULT_SYNC_BATCH_SIZE,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            probe_interval_secs: DEFAULT_CONNECTIVITY_PROBE_SECS,
        }
    }
}
