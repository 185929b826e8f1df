//! Common types shared across reader backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reader backend families known to the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// PC/SC smart card stack (pcscd, WinSCard).
    Pcsc,

    /// PN532 board attached to a serial port.
    Pn532Serial,

    /// In-process simulated reader.
    Mock,
}

impl BackendKind {
    /// Whether support for this backend was compiled in.
    pub fn is_compiled(&self) -> bool {
        match self {
            Self::Pcsc => cfg!(feature = "hardware-pcsc"),
            Self::Pn532Serial => cfg!(feature = "hardware-serial"),
            Self::Mock => true,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcsc => write!(f, "PC/SC"),
            Self::Pn532Serial => write!(f, "PN532 serial"),
            Self::Mock => write!(f, "Mock"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = crate::HardwareError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pcsc" => Ok(Self::Pcsc),
            "pn532" | "pn532_serial" | "serial" => Ok(Self::Pn532Serial),
            "mock" => Ok(Self::Mock),
            other => Err(crate::HardwareError::initialization_failed(format!(
                "unknown reader backend: {other}"
            ))),
        }
    }
}

/// Reader information.
///
/// Contains reader-specific metadata such as the backend family and
/// optional firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "ACS ACR122U PICC Interface").
    pub name: String,

    /// Backend family driving the reader.
    pub backend: BackendKind,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            name: name.into(),
            backend,
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}
