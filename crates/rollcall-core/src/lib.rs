//! Shared vocabulary for the rollcall attendance system.
//!
//! Identifiers ([`TagUid`], [`GuestId`], [`Station`]), remote cell values,
//! tuning constants and the status event bus consumed by the presentation
//! layer all live here so every other crate speaks the same types.

pub mod constants;
pub mod directory;
pub mod error;
pub mod status;
pub mod types;

pub use directory::{CellUpdate, DirectorySnapshot, GuestRecord};
pub use error::{Error, Result};
pub use status::{Severity, StatusBus, StatusEvent, StatusKind};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
