//! Status events delivered to the presentation layer.
//!
//! Registry mutations, check-in appends, reader state changes and sync
//! transitions are published on a [`StatusBus`]. The bus never blocks the
//! publisher: events go into a bounded broadcast channel and slow
//! subscribers lose the oldest events instead of stalling the scan loop.
//!
//! ```
//! use rollcall_core::{Severity, StatusBus, StatusKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = StatusBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(StatusKind::CheckIn, Severity::Success, "Welcome, Ada");
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.message, "Welcome, Ada");
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the broadcast channel backing a [`StatusBus`].
const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Severity tag attached to every status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Component that produced a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Tag registry mutation or recovery.
    Registry,

    /// Check-in recorded (or rejected) by the station.
    CheckIn,

    /// Sync coordinator state transition.
    Sync,

    /// Hardware reader state change.
    Reader,
}

/// Human-readable status message with a severity tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub kind: StatusKind,
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Fan-out channel for [`StatusEvent`]s.
///
/// Cloning the bus is cheap; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, kind: StatusKind, severity: Severity, message: impl Into<String>) {
        let event = StatusEvent {
            kind,
            severity,
            message: message.into(),
            at: Utc::now(),
        };
        tracing::trace!(kind = ?event.kind, severity = %event.severity, message = %event.message, "status");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Invoke `callback` for every event on a background task.
    ///
    /// The task ends when every clone of the bus has been dropped. Events
    /// missed because the callback fell behind are skipped.
    pub fn spawn_listener<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(StatusEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "status listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}
