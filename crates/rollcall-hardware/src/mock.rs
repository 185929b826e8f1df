//! Mock NFC reader implementation for testing and development.
//!
//! This module provides a simulated reader that can be controlled
//! programmatically: tags are presented through a [`MockReaderHandle`], the
//! reader can be unplugged and plugged back in, and every write is recorded.

use crate::{
    HardwareError, Result,
    traits::TagReader,
    types::{BackendKind, ReaderInfo},
};
use rollcall_core::TagUid;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Mock NFC reader for testing and development.
///
/// # Examples
///
/// ```
/// use rollcall_hardware::mock::MockReader;
/// use rollcall_hardware::traits::TagReader;
/// use rollcall_core::TagUid;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> rollcall_hardware::Result<()> {
///     let (mut reader, handle) = MockReader::new();
///     reader.probe().await?;
///
///     handle.present_tag(TagUid::new("04A1").unwrap()).await?;
///
///     let uid = reader.poll(Duration::from_secs(3)).await?;
///     assert_eq!(uid.unwrap().as_str(), "04A1");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    /// Channel receiver for tag events
    event_rx: mpsc::Receiver<TagEvent>,

    /// Reader name
    name: String,

    /// State shared with the handle
    shared: Arc<MockShared>,

    /// Set by a successful probe, cleared on disconnect
    ready: bool,

    /// Tag currently resting on the reader
    present: Option<TagUid>,
}

/// Write recorded by the mock reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockWrite {
    pub uid: TagUid,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
struct MockShared {
    connected: AtomicBool,
    hardware_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    fail_next_write: AtomicBool,
    writes: Mutex<Vec<MockWrite>>,
}

/// Internal event type for the mock reader.
#[derive(Debug, Clone)]
enum TagEvent {
    Presented(TagUid),
    Removed,
}

impl MockReader {
    /// Create a new mock reader with the default name.
    ///
    /// Returns a tuple of (MockReader, MockReaderHandle) where the handle
    /// can be used to simulate tag presentations and disconnects.
    pub fn new() -> (Self, MockReaderHandle) {
        Self::with_name("Mock NFC Reader".to_string())
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockReaderHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let shared = Arc::new(MockShared {
            connected: AtomicBool::new(true),
            hardware_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            fail_next_write: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        });

        let reader = Self {
            event_rx,
            name,
            shared: shared.clone(),
            ready: false,
            present: None,
        };

        (reader, MockReaderHandle { event_tx, shared })
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.shared.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            self.ready = false;
            Err(HardwareError::disconnected(self.name.clone()))
        }
    }

    async fn next_event(&mut self, timeout: Duration) -> Result<Option<TagEvent>> {
        match tokio::time::timeout(timeout, self.event_rx.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                self.ready = false;
                Err(HardwareError::disconnected("mock event channel closed"))
            }
            Err(_) => Ok(None),
        }
    }
}

impl Default for MockReader {
    fn default() -> Self {
        Self::new().0
    }
}

impl TagReader for MockReader {
    async fn probe(&mut self) -> Result<ReaderInfo> {
        self.shared.probe_calls.fetch_add(1, Ordering::SeqCst);

        if !self.shared.connected.load(Ordering::SeqCst) {
            self.ready = false;
            return Err(HardwareError::initialization_failed(format!(
                "{} unplugged",
                self.name
            )));
        }

        self.ready = true;
        Ok(ReaderInfo::new(self.name.clone(), BackendKind::Mock).with_firmware_version("mock-1"))
    }

    fn is_ready(&self) -> bool {
        self.ready && self.shared.connected.load(Ordering::SeqCst)
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<TagUid>> {
        self.shared.hardware_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        match self.next_event(timeout).await? {
            Some(TagEvent::Presented(uid)) => {
                self.present = Some(uid.clone());
                Ok(Some(uid))
            }
            Some(TagEvent::Removed) => {
                self.present = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn write(
        &mut self,
        target: Option<&TagUid>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<TagUid> {
        self.shared.hardware_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        if self.shared.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(HardwareError::write_error("simulated write failure"));
        }

        let uid = match self.present.clone() {
            Some(uid) => uid,
            None => match self.next_event(timeout).await? {
                Some(TagEvent::Presented(uid)) => {
                    self.present = Some(uid.clone());
                    uid
                }
                _ => {
                    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    return Err(HardwareError::write_timeout(millis));
                }
            },
        };

        if let Some(expected) = target
            && expected != &uid
        {
            return Err(HardwareError::write_error(format!(
                "expected tag {expected}, found {uid}"
            )));
        }

        self.shared
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockWrite {
                uid: uid.clone(),
                payload: payload.to_vec(),
            });

        Ok(uid)
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Mock
    }
}

/// Handle for controlling a mock reader.
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    /// Channel sender for tag events
    event_tx: mpsc::Sender<TagEvent>,

    /// State shared with the reader
    shared: Arc<MockShared>,
}

impl MockReaderHandle {
    /// Place a tag on the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn present_tag(&self, uid: TagUid) -> Result<()> {
        self.event_tx
            .send(TagEvent::Presented(uid))
            .await
            .map_err(|_| HardwareError::disconnected("mock reader dropped"))
    }

    /// Take the tag off the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader has been dropped.
    pub async fn remove_tag(&self) -> Result<()> {
        self.event_tx
            .send(TagEvent::Removed)
            .await
            .map_err(|_| HardwareError::disconnected("mock reader dropped"))
    }

    /// Simulate unplugging the reader.
    pub fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
    }

    /// Simulate plugging the reader back in.
    pub fn reconnect(&self) {
        self.shared.connected.store(true, Ordering::SeqCst);
    }

    /// Make the next write fail mid-transaction.
    pub fn fail_next_write(&self) {
        self.shared.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Number of poll/write calls that reached the "hardware".
    pub fn hardware_calls(&self) -> usize {
        self.shared.hardware_calls.load(Ordering::SeqCst)
    }

    /// Number of probe calls.
    pub fn probe_calls(&self) -> usize {
        self.shared.probe_calls.load(Ordering::SeqCst)
    }

    /// Writes performed so far, oldest first.
    pub fn writes(&self) -> Vec<MockWrite> {
        self.shared
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> TagUid {
        TagUid::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_poll_returns_presented_tag() {
        let (mut reader, handle) = MockReader::new();
        reader.probe().await.unwrap();
        assert!(reader.is_ready());

        handle.present_tag(uid("04A1")).await.unwrap();
        let read = reader.poll(Duration::from_millis(100)).await.unwrap();
        assert_eq!(read, Some(uid("04A1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_without_tag() {
        let (mut reader, _handle) = MockReader::new();
        reader.probe().await.unwrap();

        let read = reader.poll(Duration::from_secs(3)).await.unwrap();
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_disconnect_and_probe() {
        let (mut reader, handle) = MockReader::new();
        reader.probe().await.unwrap();

        handle.disconnect();
        assert!(!reader.is_ready());
        assert!(reader.poll(Duration::from_millis(10)).await.is_err());
        assert!(reader.probe().await.is_err());

        handle.reconnect();
        reader.probe().await.unwrap();
        assert!(reader.is_ready());
        assert_eq!(handle.probe_calls(), 3);
    }

    #[tokio::test]
    async fn test_write_records_payload() {
        let (mut reader, handle) = MockReader::new();
        reader.probe().await.unwrap();
        handle.present_tag(uid("04A1")).await.unwrap();

        let written = reader
            .write(None, b"payload", Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(written, uid("04A1"));
        assert_eq!(handle.writes()[0].payload, b"payload".to_vec());
    }

    #[tokio::test]
    async fn test_write_refuses_other_tag() {
        let (mut reader, handle) = MockReader::new();
        reader.probe().await.unwrap();
        handle.present_tag(uid("04A1")).await.unwrap();
        reader.poll(Duration::from_millis(100)).await.unwrap();

        let err = reader
            .write(Some(&uid("04B2")), b"x", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::WriteError { .. }));
        assert!(handle.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_times_out_without_tag() {
        let (mut reader, _handle) = MockReader::new();
        reader.probe().await.unwrap();

        let err = reader
            .write(None, b"x", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, HardwareError::WriteTimeout { .. }));
    }
}
