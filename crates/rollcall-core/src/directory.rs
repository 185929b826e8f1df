//! Remote guest directory data model.
//!
//! The directory is a table with one row per guest and one column per
//! station. A [`DirectorySnapshot`] is a point-in-time copy of that table,
//! fetched at the start of every sync cycle and cached on disk so names can
//! be resolved offline.

use crate::types::{CellValue, GuestId, Station};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One guest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub guest_id: GuestId,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Station cells keyed by station column key.
    #[serde(default)]
    pub stations: BTreeMap<String, CellValue>,
}

impl GuestRecord {
    pub fn new(guest_id: GuestId, name: impl Into<String>) -> Self {
        Self {
            guest_id,
            name: name.into(),
            stations: BTreeMap::new(),
        }
    }

    /// Cell for `station`, empty when the column is missing.
    pub fn cell(&self, station: &Station) -> CellValue {
        self.stations
            .get(station.key())
            .cloned()
            .unwrap_or_default()
    }
}

/// Point-in-time copy of the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub fetched_at: DateTime<Utc>,
    pub guests: Vec<GuestRecord>,
}

impl DirectorySnapshot {
    pub fn new(fetched_at: DateTime<Utc>, guests: Vec<GuestRecord>) -> Self {
        Self { fetched_at, guests }
    }

    pub fn guest(&self, guest_id: &GuestId) -> Option<&GuestRecord> {
        self.guests.iter().find(|g| &g.guest_id == guest_id)
    }

    /// Cell for `(guest_id, station)`; `None` when the guest is unknown.
    pub fn cell(&self, guest_id: &GuestId, station: &Station) -> Option<CellValue> {
        self.guest(guest_id).map(|g| g.cell(station))
    }

    /// Apply a confirmed write to the cached copy.
    ///
    /// Returns `false` when the guest is not in the snapshot.
    pub fn apply(&mut self, update: &CellUpdate) -> bool {
        match self.guests.iter_mut().find(|g| g.guest_id == update.guest_id) {
            Some(guest) => {
                guest
                    .stations
                    .insert(update.station.key().to_string(), update.value.clone());
                true
            }
            None => false,
        }
    }
}

/// A single cell write sent to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub guest_id: GuestId,
    pub station: Station,
    pub value: CellValue,
}

impl CellUpdate {
    pub fn new(guest_id: GuestId, station: Station, value: CellValue) -> Self {
        Self {
            guest_id,
            station,
            value,
        }
    }
}
