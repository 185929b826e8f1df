//! Reader port: the Ready/Disconnected state machine in front of a backend.
//!
//! ```text
//!            poll/write error
//!   Ready ─────────────────────► Disconnected
//!     ▲                               │
//!     │      reconnect probe ok       │ polls short-circuit, no
//!     └───────────────────────────────┘ hardware call until the
//!                                       reconnect interval passes
//! ```
//!
//! The first hardware failure is logged once and published on the status
//! bus. While disconnected the port answers polls locally and only touches
//! the driver with a probe every `reconnect_interval`.
//!
//! The state is mirrored into a [`Readiness`] handle so status queries never
//! wait behind an in-flight poll or write.

use crate::devices::AnyTagReader;
use crate::selector::{ReaderConfig, SelectedReader};
use crate::traits::TagReader;
use crate::types::{BackendKind, ReaderInfo};
use crate::{HardwareError, Result};
use rollcall_core::{Severity, StatusBus, StatusKind, TagUid};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connection state of the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Ready,
    Disconnected {
        /// When the driver was last touched (failure or probe).
        last_probe: Instant,
    },
}

/// Result of one poll of the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Tag(TagUid),
    NoTag,
    Disconnected,
}

/// Shared, lock-free view of whether a [`ReaderPort`] is Ready.
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, ready: bool) {
        self.0.store(ready, Ordering::Release);
    }
}

/// Hardware reader port.
#[derive(Debug)]
pub struct ReaderPort {
    reader: AnyTagReader,
    state: PortState,
    readiness: Readiness,
    info: Option<ReaderInfo>,
    poll_timeout: Duration,
    write_timeout: Duration,
    reconnect_interval: Duration,
    status: Option<StatusBus>,
}

impl ReaderPort {
    /// Wrap a reader picked by the selector.
    ///
    /// The port starts Ready only if the selector's probe succeeded.
    pub fn new(selected: SelectedReader, config: &ReaderConfig) -> Self {
        let state = match selected.info {
            Some(_) if selected.reader.is_ready() => PortState::Ready,
            _ => PortState::Disconnected {
                last_probe: Instant::now(),
            },
        };

        let readiness = Readiness::default();
        readiness.set(state == PortState::Ready);

        Self {
            reader: selected.reader,
            state,
            readiness,
            info: selected.info,
            poll_timeout: config.poll_timeout(),
            write_timeout: config.write_timeout(),
            reconnect_interval: config.reconnect_interval(),
            status: None,
        }
    }

    /// Wrap an unprobed reader and probe it once.
    pub async fn open(mut reader: AnyTagReader, config: &ReaderConfig) -> Self {
        let info = reader.probe().await.ok();
        Self::new(SelectedReader { reader, info }, config)
    }

    /// Publish reader state changes on `bus`.
    pub fn with_status(mut self, bus: StatusBus) -> Self {
        self.status = Some(bus);
        self
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == PortState::Ready
    }

    /// Handle that tracks readiness without borrowing the port.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    pub fn backend(&self) -> BackendKind {
        self.reader.backend()
    }

    /// Bound on a single tag write.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Last successful probe result.
    pub fn info(&self) -> Option<&ReaderInfo> {
        self.info.as_ref()
    }

    /// Poll for a tag.
    ///
    /// Never returns an error: hardware failures move the port to
    /// Disconnected and are reported as [`PollOutcome::Disconnected`].
    pub async fn poll(&mut self) -> PollOutcome {
        if !self.is_ready() && !self.try_reconnect().await {
            return PollOutcome::Disconnected;
        }

        match self.reader.poll(self.poll_timeout).await {
            Ok(Some(uid)) => {
                debug!(tag_uid = %uid, "tag read");
                PollOutcome::Tag(uid)
            }
            Ok(None) | Err(HardwareError::Timeout { .. }) => PollOutcome::NoTag,
            // tag pulled away mid-read; the reader itself is fine
            Err(HardwareError::InvalidData { message }) => {
                debug!(%message, "discarding partial read");
                PollOutcome::NoTag
            }
            Err(e) => {
                self.mark_disconnected(&e);
                PollOutcome::Disconnected
            }
        }
    }

    /// Write `payload` to the tag on the reader.
    ///
    /// Callers must check [`is_ready`](Self::is_ready) first. A failed write
    /// is never retried here: the tag may be half-written and the operator
    /// has to present it again.
    ///
    /// # Errors
    ///
    /// Returns `NotReady` when the port is disconnected, otherwise the
    /// backend's write error.
    pub async fn write(&mut self, target: Option<&TagUid>, payload: &[u8]) -> Result<TagUid> {
        if !self.is_ready() {
            return Err(HardwareError::not_ready("write"));
        }

        match self.reader.write(target, payload, self.write_timeout).await {
            Ok(uid) => {
                info!(tag_uid = %uid, bytes = payload.len(), "tag written");
                Ok(uid)
            }
            Err(e) => {
                if e.is_disconnect() {
                    self.mark_disconnected(&e);
                }
                Err(e)
            }
        }
    }

    /// Probe the reader if the reconnect interval has passed.
    ///
    /// Returns whether the port is Ready afterwards.
    pub async fn try_reconnect(&mut self) -> bool {
        let last_probe = match self.state {
            PortState::Ready => return true,
            PortState::Disconnected { last_probe } => last_probe,
        };

        if last_probe.elapsed() < self.reconnect_interval {
            return false;
        }

        match self.reader.probe().await {
            Ok(info) => {
                info!(reader = %info.name, "reader reconnected");
                self.emit(Severity::Success, format!("Reader ready: {}", info.name));
                self.info = Some(info);
                self.set_state(PortState::Ready);
                true
            }
            Err(e) => {
                debug!(error = %e, "reconnect probe failed");
                self.set_state(PortState::Disconnected {
                    last_probe: Instant::now(),
                });
                false
            }
        }
    }

    fn mark_disconnected(&mut self, error: &HardwareError) {
        if self.is_ready() {
            warn!(backend = %self.reader.backend(), %error, "reader disconnected");
            self.emit(Severity::Warning, "Reader disconnected");
        }
        self.set_state(PortState::Disconnected {
            last_probe: Instant::now(),
        });
    }

    fn set_state(&mut self, state: PortState) {
        self.state = state;
        self.readiness.set(state == PortState::Ready);
    }

    fn emit(&self, severity: Severity, message: impl Into<String>) {
        if let Some(bus) = &self.status {
            bus.emit(StatusKind::Reader, severity, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReader, MockReaderHandle};

    async fn mock_port() -> (ReaderPort, MockReaderHandle) {
        let (reader, handle) = MockReader::new();
        let config = ReaderConfig::mock()
            .with_poll_timeout(Duration::from_millis(50))
            .with_reconnect_interval(Duration::from_secs(5));
        let port = ReaderPort::open(AnyTagReader::from(reader), &config).await;
        (port, handle)
    }

    fn uid(s: &str) -> TagUid {
        TagUid::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_tag_and_no_tag() {
        let (mut port, handle) = mock_port().await;
        assert!(port.is_ready());

        handle.present_tag(uid("04A1")).await.unwrap();
        assert_eq!(port.poll().await, PollOutcome::Tag(uid("04A1")));
        assert_eq!(port.poll().await, PollOutcome::NoTag);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_follows_state() {
        let (mut port, handle) = mock_port().await;
        let readiness = port.readiness();
        assert!(readiness.is_ready());

        handle.disconnect();
        assert_eq!(port.poll().await, PollOutcome::Disconnected);
        assert!(!readiness.is_ready());

        handle.reconnect();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(port.try_reconnect().await);
        assert!(readiness.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_short_circuits_polls() {
        let (mut port, handle) = mock_port().await;
        let bus = StatusBus::new();
        let mut events = bus.subscribe();
        port = port.with_status(bus);

        handle.disconnect();
        assert_eq!(port.poll().await, PollOutcome::Disconnected);
        let calls = handle.hardware_calls();
        let probes = handle.probe_calls();

        for _ in 0..10 {
            assert_eq!(port.poll().await, PollOutcome::Disconnected);
        }
        assert_eq!(handle.hardware_calls(), calls);
        assert_eq!(handle.probe_calls(), probes);

        let event = events.try_recv().unwrap();
        assert_eq!(event.severity, Severity::Warning);
        assert!(events.try_recv().is_err(), "one warning per transition");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_interval() {
        let (mut port, handle) = mock_port().await;

        handle.disconnect();
        assert_eq!(port.poll().await, PollOutcome::Disconnected);

        handle.reconnect();
        assert_eq!(port.poll().await, PollOutcome::Disconnected);

        tokio::time::advance(Duration::from_secs(6)).await;
        handle.present_tag(uid("04A1")).await.unwrap();
        assert_eq!(port.poll().await, PollOutcome::Tag(uid("04A1")));
        assert!(port.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_waits_another_interval() {
        let (mut port, handle) = mock_port().await;
        handle.disconnect();
        port.poll().await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(port.poll().await, PollOutcome::Disconnected);
        assert_eq!(handle.probe_calls(), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        port.poll().await;
        assert_eq!(handle.probe_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_when_not_ready() {
        let (mut port, handle) = mock_port().await;
        handle.disconnect();
        port.poll().await;

        let err = port.write(None, b"1001").await.unwrap_err();
        assert!(matches!(err, HardwareError::NotReady { .. }));
        assert!(handle.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_not_retried() {
        let (mut port, handle) = mock_port().await;
        handle.present_tag(uid("04A1")).await.unwrap();
        port.poll().await;

        handle.fail_next_write();
        assert!(port.write(None, b"1001").await.is_err());
        assert!(handle.writes().is_empty());
        assert!(port.is_ready());

        port.write(None, b"1001").await.unwrap();
        assert_eq!(handle.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_unprobed_port_starts_disconnected() {
        let (reader, _handle) = MockReader::new();
        let port = ReaderPort::new(
            SelectedReader {
                reader: AnyTagReader::from(reader),
                info: None,
            },
            &ReaderConfig::mock(),
        );
        assert!(matches!(port.state(), PortState::Disconnected { .. }));
    }
}
