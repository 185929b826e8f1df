//! Hardware reader port for the rollcall attendance system.
//!
//! This crate hides the NFC reader hardware behind one capability
//! interface, [`TagReader`], with interchangeable backends:
//!
//! - **PC/SC** (`hardware-pcsc` feature): ACR122U and other CCID readers
//!   through pcscd or WinSCard.
//! - **PN532 serial** (`hardware-serial` feature, default): PN532 boards on a
//!   UART, driven with the PN532 host frame protocol.
//! - **Mock**: an in-process reader controlled through a handle, for tests
//!   and development without hardware.
//!
//! At startup a [`ReaderSelector`] probes the preferred backends and binds
//! the first that answers. The bound reader is wrapped in a [`ReaderPort`],
//! which owns the Ready/Disconnected state machine so a missing reader
//! costs one warning and an occasional probe instead of an error on every
//! poll.
//!
//! ```
//! use rollcall_hardware::mock::MockReader;
//! use rollcall_hardware::{PollOutcome, ReaderConfig, ReaderPort, ReaderSelector};
//! use rollcall_core::TagUid;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (mock, handle) = MockReader::new();
//! let config = ReaderConfig::mock();
//! let selected = ReaderSelector::new(config.clone()).with_mock(mock).select().await;
//! let mut port = ReaderPort::new(selected, &config);
//!
//! handle.present_tag(TagUid::new("04:A1").unwrap()).await.unwrap();
//! assert_eq!(port.poll().await, PollOutcome::Tag(TagUid::new("04A1").unwrap()));
//! # }
//! ```

pub mod backends;
pub mod devices;
pub mod error;
pub mod mock;
pub mod ndef;
pub mod port;
pub mod selector;
pub mod traits;
pub mod types;

pub use devices::AnyTagReader;
pub use error::{HardwareError, Result};
pub use port::{PollOutcome, PortState, Readiness, ReaderPort};
pub use selector::{ReaderConfig, ReaderSelector, SelectedReader};
pub use traits::TagReader;
pub use types::{BackendKind, ReaderInfo};
