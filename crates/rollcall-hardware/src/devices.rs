//! Enum wrapper for reader backend dispatch.
//!
//! Native `async fn` in traits is not object-safe, so `Box<dyn TagReader>`
//! is not available. [`AnyTagReader`] gives the reader port a single
//! concrete type covering every backend compiled into this build.
//!
//! ```
//! use rollcall_hardware::devices::AnyTagReader;
//! use rollcall_hardware::mock::MockReader;
//! use rollcall_hardware::traits::TagReader;
//! use rollcall_hardware::types::BackendKind;
//!
//! let (reader, _handle) = MockReader::new();
//! let any = AnyTagReader::from(reader);
//! assert_eq!(any.backend(), BackendKind::Mock);
//! ```

#[cfg(feature = "hardware-pcsc")]
use crate::backends::PcscReader;
#[cfg(feature = "hardware-serial")]
use crate::backends::Pn532Reader;
use crate::mock::MockReader;
use crate::traits::TagReader;
use crate::types::{BackendKind, ReaderInfo};
use crate::Result;
use rollcall_core::TagUid;
use std::time::Duration;

/// Any reader backend available in this build.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTagReader {
    /// PC/SC reader (ACR122U and other CCID devices).
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscReader),

    /// PN532 board on a serial port.
    #[cfg(feature = "hardware-serial")]
    Pn532(Pn532Reader),

    /// Simulated reader for development and testing.
    Mock(MockReader),
}

macro_rules! dispatch {
    ($self:expr, $reader:ident => $body:expr) => {
        match $self {
            #[cfg(feature = "hardware-pcsc")]
            AnyTagReader::Pcsc($reader) => $body,
            #[cfg(feature = "hardware-serial")]
            AnyTagReader::Pn532($reader) => $body,
            AnyTagReader::Mock($reader) => $body,
        }
    };
}

impl TagReader for AnyTagReader {
    async fn probe(&mut self) -> Result<ReaderInfo> {
        dispatch!(self, reader => reader.probe().await)
    }

    fn is_ready(&self) -> bool {
        dispatch!(self, reader => reader.is_ready())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<TagUid>> {
        dispatch!(self, reader => reader.poll(timeout).await)
    }

    async fn write(
        &mut self,
        target: Option<&TagUid>,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<TagUid> {
        dispatch!(self, reader => reader.write(target, payload, timeout).await)
    }

    fn backend(&self) -> BackendKind {
        dispatch!(self, reader => reader.backend())
    }
}

impl From<MockReader> for AnyTagReader {
    fn from(reader: MockReader) -> Self {
        Self::Mock(reader)
    }
}

#[cfg(feature = "hardware-pcsc")]
impl From<PcscReader> for AnyTagReader {
    fn from(reader: PcscReader) -> Self {
        Self::Pcsc(reader)
    }
}

#[cfg(feature = "hardware-serial")]
impl From<Pn532Reader> for AnyTagReader {
    fn from(reader: Pn532Reader) -> Self {
        Self::Pn532(reader)
    }
}
