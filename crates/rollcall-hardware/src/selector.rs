//! Startup backend selection.
//!
//! The selector walks the configured backend preference list, probing each
//! compiled-in backend, and binds the first one that answers. When none
//! answers it still hands back the default backend (unprobed) so the port
//! starts out Disconnected and keeps probing in the background; a station
//! can boot before its reader is plugged in.

use crate::devices::AnyTagReader;
use crate::mock::MockReader;
use crate::traits::TagReader;
use crate::types::{BackendKind, ReaderInfo};
use crate::{HardwareError, Result};
use rollcall_core::constants::{
    DEFAULT_POLL_TIMEOUT_MS, DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Backends to probe, most preferred first.
    pub preference: Vec<BackendKind>,

    /// Backend bound when no probe succeeds.
    pub default_backend: BackendKind,

    /// Poll timeout in milliseconds.
    pub poll_timeout_ms: u64,

    /// Write timeout in milliseconds.
    pub write_timeout_ms: u64,

    /// Minimum spacing between reconnect probes in milliseconds.
    pub reconnect_interval_ms: u64,

    /// Serial port of a PN532 board. Platform default when unset.
    pub serial_port: Option<String>,

    /// Serial baud rate.
    pub serial_baud_rate: u32,

    /// Substring a PC/SC reader name must contain.
    pub pcsc_reader_filter: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            preference: vec![BackendKind::Pcsc, BackendKind::Pn532Serial],
            default_backend: BackendKind::Pn532Serial,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            serial_port: None,
            serial_baud_rate: 115_200,
            pcsc_reader_filter: None,
        }
    }
}

impl ReaderConfig {
    /// Config that only ever binds the mock backend.
    pub fn mock() -> Self {
        Self {
            preference: vec![BackendKind::Mock],
            default_backend: BackendKind::Mock,
            ..Self::default()
        }
    }

    pub fn with_preference(mut self, preference: Vec<BackendKind>) -> Self {
        self.preference = preference;
        self
    }

    pub fn with_default_backend(mut self, backend: BackendKind) -> Self {
        self.default_backend = backend;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial_port = Some(port.into());
        self
    }

    pub fn with_pcsc_filter(mut self, filter: impl Into<String>) -> Self {
        self.pcsc_reader_filter = Some(filter.into());
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

/// Reader chosen at startup.
#[derive(Debug)]
pub struct SelectedReader {
    pub reader: AnyTagReader,

    /// Probe result; `None` when the fallback backend was bound unprobed.
    pub info: Option<ReaderInfo>,
}

/// Probes backends and binds one.
#[derive(Debug)]
pub struct ReaderSelector {
    config: ReaderConfig,
    mock: Option<MockReader>,
}

impl ReaderSelector {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config, mock: None }
    }

    /// Supply the reader used for [`BackendKind::Mock`].
    ///
    /// Without one, the mock backend is a reader with nothing attached.
    pub fn with_mock(mut self, reader: MockReader) -> Self {
        self.mock = Some(reader);
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Probe each backend of the preference list and bind the first that
    /// answers, falling back to the default backend.
    pub async fn select(mut self) -> SelectedReader {
        let preference = self.config.preference.clone();
        let fallback = self.fallback_kind();
        let mut unanswered = None;

        for kind in preference {
            let mut reader = match self.build(kind) {
                Ok(reader) => reader,
                Err(e) => {
                    debug!(backend = %kind, error = %e, "backend skipped");
                    continue;
                }
            };

            match reader.probe().await {
                Ok(info) => {
                    info!(backend = %kind, reader = %info.name, "reader bound");
                    return SelectedReader {
                        reader,
                        info: Some(info),
                    };
                }
                Err(e) => {
                    debug!(backend = %kind, error = %e, "probe failed");
                    if kind == fallback && unanswered.is_none() {
                        unanswered = Some(reader);
                    }
                }
            }
        }

        warn!(backend = %fallback, "no reader answered, starting disconnected");

        let reader = match unanswered {
            Some(reader) => reader,
            None => self
                .build(fallback)
                .unwrap_or_else(|_| AnyTagReader::from(MockReader::default())),
        };
        SelectedReader { reader, info: None }
    }

    /// Probe every compiled-in backend and report the outcome of each.
    pub async fn available(config: &ReaderConfig) -> Vec<(BackendKind, Result<ReaderInfo>)> {
        let mut selector = Self::new(config.clone());
        let mut report = Vec::new();

        for kind in [BackendKind::Pcsc, BackendKind::Pn532Serial] {
            let outcome = match selector.build(kind) {
                Ok(mut reader) => reader.probe().await,
                Err(e) => Err(e),
            };
            report.push((kind, outcome));
        }

        report
    }

    fn fallback_kind(&self) -> BackendKind {
        if self.config.default_backend.is_compiled() {
            self.config.default_backend
        } else {
            BackendKind::Mock
        }
    }

    fn build(&mut self, kind: BackendKind) -> Result<AnyTagReader> {
        if !kind.is_compiled() {
            return Err(HardwareError::unsupported(format!(
                "{kind} support not compiled in"
            )));
        }

        match kind {
            #[cfg(feature = "hardware-pcsc")]
            BackendKind::Pcsc => Ok(AnyTagReader::from(crate::backends::PcscReader::new(
                crate::backends::PcscConfig {
                    reader_filter: self.config.pcsc_reader_filter.clone(),
                },
            ))),
            #[cfg(feature = "hardware-serial")]
            BackendKind::Pn532Serial => {
                let mut serial = crate::backends::Pn532Config::default();
                if let Some(port) = &self.config.serial_port {
                    serial.port = port.clone();
                }
                serial.baud_rate = self.config.serial_baud_rate;
                Ok(AnyTagReader::from(crate::backends::Pn532Reader::new(serial)))
            }
            BackendKind::Mock => Ok(AnyTagReader::from(self.mock.take().unwrap_or_default())),
            #[allow(unreachable_patterns)]
            other => Err(HardwareError::unsupported(format!(
                "{other} support not compiled in"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::TagUid;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::default();
        assert_eq!(config.poll_timeout(), Duration::from_secs(3));
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.preference.len(), 2);
    }

    #[rstest]
    #[case(Duration::from_millis(250), 250)]
    #[case(Duration::from_secs(10), 10_000)]
    #[case(Duration::MAX, u64::MAX)]
    fn test_timeout_setters_saturate(#[case] timeout: Duration, #[case] expected_ms: u64) {
        let config = ReaderConfig::mock()
            .with_poll_timeout(timeout)
            .with_write_timeout(timeout)
            .with_reconnect_interval(timeout);
        assert_eq!(config.poll_timeout_ms, expected_ms);
        assert_eq!(config.write_timeout_ms, expected_ms);
        assert_eq!(config.reconnect_interval_ms, expected_ms);
    }

    #[test]
    fn test_config_partial_json() {
        let config: ReaderConfig =
            serde_json::from_str(r#"{"serial_port": "/dev/ttyAMA0", "preference": ["mock"]}"#)
                .unwrap();
        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyAMA0"));
        assert_eq!(config.preference, vec![BackendKind::Mock]);
        assert_eq!(config.poll_timeout_ms, DEFAULT_POLL_TIMEOUT_MS);
    }

    #[tokio::test]
    async fn test_select_binds_mock() {
        let (mock, handle) = MockReader::new();
        let selected = ReaderSelector::new(ReaderConfig::mock())
            .with_mock(mock)
            .select()
            .await;

        assert!(selected.info.is_some());
        assert_eq!(selected.reader.backend(), BackendKind::Mock);

        let mut reader = selected.reader;
        handle
            .present_tag(TagUid::new("04A1").unwrap())
            .await
            .unwrap();
        assert!(
            reader
                .poll(Duration::from_millis(100))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_select_falls_back_unprobed() {
        let (mock, handle) = MockReader::new();
        handle.disconnect();

        let selected = ReaderSelector::new(ReaderConfig::mock())
            .with_mock(mock)
            .select()
            .await;

        assert!(selected.info.is_none());
        assert_eq!(selected.reader.backend(), BackendKind::Mock);
        assert!(!selected.reader.is_ready());

        // the injected reader is kept, so plugging it in later works
        let mut reader = selected.reader;
        handle.reconnect();
        assert!(reader.probe().await.is_ok());
    }

    #[tokio::test]
    async fn test_available_reports_every_hardware_backend() {
        let config = ReaderConfig::default().with_serial_port("/dev/rollcall-missing-port");
        let report = ReaderSelector::available(&config).await;

        let kinds: Vec<_> = report.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![BackendKind::Pcsc, BackendKind::Pn532Serial]);
        assert!(report[1].1.is_err());
    }
}
