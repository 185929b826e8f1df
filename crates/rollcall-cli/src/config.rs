//! Application configuration file.

use anyhow::{Context, Result};
use rollcall_hardware::ReaderConfig;
use rollcall_network::DirectoryConfig;
use rollcall_station::StationConfig;
use rollcall_storage::StorageConfig;
use rollcall_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::Cli;

/// Environment variable overriding `directory.api_token`.
pub const API_TOKEN_ENV: &str = "ROLLCALL_API_TOKEN";

/// Environment variable overriding `directory.endpoint`.
pub const ENDPOINT_ENV: &str = "ROLLCALL_ENDPOINT";

/// Everything a station needs, one section per crate.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub station: StationConfig,
    pub reader: ReaderConfig,
    pub directory: DirectoryConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Read a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Load the file named on the command line, then apply environment and
    /// flag overrides, in that order.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(dir) = &cli.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(station) = &cli.station {
            config.station.station = station.clone();
        }

        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(API_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.directory.api_token = Some(token);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.is_empty()) {
            self.directory.endpoint = endpoint;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(!config.directory.is_configured());
    }

    #[test]
    fn test_partial_sections() {
        let raw = r#"{
            "station": { "station": "Main Hall" },
            "sync": { "batch_size": 5 },
            "directory": { "endpoint": "https://sheets.example.org/event" }
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.station.station().unwrap().key(), "main_hall");
        assert_eq!(config.sync.batch_size, 5);
        assert_eq!(config.sync.interval_secs, SyncConfig::default().interval_secs);
        assert!(config.directory.is_configured());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"storage": {{"data_dir": "/var/lib/rollcall"}}}}"#).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.data_dir, Path::new("/var/lib/rollcall"));
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }

    #[test]
    fn test_env_overrides_directory() {
        let mut config = AppConfig::default();
        config.apply_env(|key| match key {
            API_TOKEN_ENV => Some("secret".to_string()),
            ENDPOINT_ENV => Some("https://sheets.example.org".to_string()),
            _ => None,
        });

        assert_eq!(config.directory.api_token.as_deref(), Some("secret"));
        assert_eq!(config.directory.endpoint, "https://sheets.example.org");
    }

    #[test]
    fn test_empty_env_ignored() {
        let mut config = AppConfig::default();
        config.directory.api_token = Some("from-file".to_string());
        config.apply_env(|_| Some(String::new()));

        assert_eq!(config.directory.api_token.as_deref(), Some("from-file"));
    }
}
