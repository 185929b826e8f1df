use rollcall_core::constants::{
    DEFAULT_DEBOUNCE_WINDOW_SECS, DEFAULT_RETENTION_SECS, LEDGER_ARCHIVE_FILE, LEDGER_FILE,
    REGISTRY_FILE, SNAPSHOT_FILE,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local store configuration
///
/// All stores live as plain files under `data_dir` so an operator can
/// inspect or hand-repair them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the registry, ledger and snapshot cache
    pub data_dir: PathBuf,

    /// Repeated scans within this many seconds collapse into one entry
    pub debounce_window_secs: u64,

    /// Synced entries older than this many seconds are archived on compaction
    pub retention_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            debounce_window_secs: DEFAULT_DEBOUNCE_WINDOW_SECS,
            retention_secs: DEFAULT_RETENTION_SECS,
        }
    }
}

impl StorageConfig {
    /// Create a new storage configuration rooted at the given directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the debounce window
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window_secs = window.as_secs();
        self
    }

    /// Set the retention window used by compaction
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    pub fn debounce_window_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.debounce_window_secs as i64)
    }

    pub fn retention_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention_secs as i64)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join(REGISTRY_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_ARCHIVE_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = StorageConfig::new("/var/lib/rollcall");
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/var/lib/rollcall/registry.json")
        );
        assert_eq!(
            config.ledger_path(),
            PathBuf::from("/var/lib/rollcall/checkins.jsonl")
        );
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::new("data")
            .debounce_window(Duration::from_secs(10))
            .retention(Duration::from_secs(3600));
        assert_eq!(config.debounce_window_duration(), chrono::Duration::seconds(10));
        assert_eq!(config.retention_secs, 3600);
    }
}
