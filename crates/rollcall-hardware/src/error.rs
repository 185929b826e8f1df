//! Error types for hardware operations.
//!
//! This module defines error types specific to NFC reader operations,
//! covering disconnection, timeouts, driver failures and misuse of the
//! reader port.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during reader operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Reader is not connected or has been disconnected.
    #[error("Reader disconnected: {device}")]
    Disconnected { device: String },

    /// Poll timed out after specified duration.
    #[error("Read timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Write did not complete in time; tag content may be partially written.
    #[error("Write timeout after {duration_ms}ms")]
    WriteTimeout { duration_ms: u64 },

    /// Operation issued against a port that is not ready.
    #[error("Reader not ready for {operation}")]
    NotReady { operation: String },

    /// Operation is not supported by this backend.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Driver or link-level communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from the reader or the tag.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Backend initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Tag write rejected by the tag or the reader.
    #[error("Tag write error: {message}")]
    WriteError { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new read timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new write timeout error.
    pub fn write_timeout(duration_ms: u64) -> Self {
        Self::WriteTimeout { duration_ms }
    }

    /// Create a new not-ready error.
    pub fn not_ready(operation: impl Into<String>) -> Self {
        Self::NotReady {
            operation: operation.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new tag write error.
    pub fn write_error(message: impl Into<String>) -> Self {
        Self::WriteError {
            message: message.into(),
        }
    }

    /// Whether the error means the reader itself went away, as opposed to
    /// a tag-level or timing problem.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. }
                | Self::CommunicationError { .. }
                | Self::InitializationFailed { .. }
                | Self::Io(_)
        )
    }
}
