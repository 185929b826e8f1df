//! Check-in station for the rollcall attendance system.
//!
//! A station is one physical check-in point: an NFC reader, the local tag
//! registry and ledger, and a sync coordinator feeding the shared guest
//! directory. [`StationService`] is the façade the presentation layer
//! calls; [`ScanLoop`] is the foreground task that turns reader polls into
//! check-ins.
//!
//! Check-ins never wait on the network. A scan is on disk once
//! [`StationService::check_in_tag`] returns, and the sync coordinator
//! catches the directory up whenever it is reachable.

pub mod config;
pub mod error;
pub mod scan;
pub mod service;

pub use config::StationConfig;
pub use error::{StationError, StationResult};
pub use scan::ScanLoop;
pub use service::{CheckInOutcome, StationService, StationStatus};
