use chrono::{DateTime, Utc};
use rollcall_core::{AttendanceMark, CellValue, GuestId, Station};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sync lifecycle of a ledger entry
///
/// ```text
/// Pending ──write ok──► Synced
///    │  ▲
///    │  └── backoff elapsed
///    ▼  │
///  Failed
/// ```
///
/// `Synced` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Synced => write!(f, "synced"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One attendance fact recorded at a station
///
/// Entries are created `Pending`, never edited except for their sync
/// bookkeeping, and only leave the ledger through compaction (once synced)
/// or an explicit operator queue clear.
///
/// # Examples
///
/// ```
/// use rollcall_storage::models::{CheckInEntry, SyncState};
/// use rollcall_core::{AttendanceMark, GuestId, Station};
/// use chrono::Utc;
///
/// let entry = CheckInEntry::new(
///     GuestId::from(1001),
///     Station::new("Reception").unwrap(),
///     AttendanceMark::Present,
///     Utc::now(),
/// );
///
/// assert_eq!(entry.sync_state, SyncState::Pending);
/// assert_eq!(entry.sync_attempts, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInEntry {
    /// Unique entry id
    pub entry_id: Uuid,

    /// Guest that was detected or marked
    pub guest_id: GuestId,

    /// Station where the fact was recorded
    pub station: Station,

    /// Present check-in or operator-marked absence
    pub mark: AttendanceMark,

    /// When the tag was read (or the mark made)
    pub detected_at: DateTime<Utc>,

    pub sync_state: SyncState,

    /// Failed remote write attempts so far
    #[serde(default)]
    pub sync_attempts: u32,

    /// Time of the last remote write attempt
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// Error reported by the last failed attempt
    #[serde(default)]
    pub last_error: Option<String>,
}

impl CheckInEntry {
    pub fn new(
        guest_id: GuestId,
        station: Station,
        mark: AttendanceMark,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            guest_id,
            station,
            mark,
            detected_at,
            sync_state: SyncState::Pending,
            sync_attempts: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.sync_state == SyncState::Synced
    }

    /// Not yet confirmed by the remote directory.
    pub fn is_outstanding(&self) -> bool {
        !self.is_synced()
    }

    /// Whether `other` records the same fact for the same guest and station.
    pub fn same_subject(&self, guest_id: &GuestId, station: &Station, mark: AttendanceMark) -> bool {
        &self.guest_id == guest_id && &self.station == station && self.mark == mark
    }

    /// Cell value this entry writes to the remote directory.
    pub fn cell_value(&self) -> CellValue {
        match self.mark {
            AttendanceMark::Present => CellValue::CheckedIn(self.detected_at),
            AttendanceMark::Absent => CellValue::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mark: AttendanceMark) -> CheckInEntry {
        CheckInEntry::new(
            GuestId::from(1001),
            Station::new("Reception").unwrap(),
            mark,
            Utc::now(),
        )
    }

    #[test]
    fn test_cell_value() {
        let present = entry(AttendanceMark::Present);
        assert_eq!(
            present.cell_value().checked_in_at(),
            Some(present.detected_at)
        );
        assert_eq!(entry(AttendanceMark::Absent).cell_value(), CellValue::Absent);
    }

    #[test]
    fn test_json_roundtrip_keeps_station_name() {
        let entry = entry(AttendanceMark::Present);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""station":"Reception""#));
        assert!(json.contains(r#""sync_state":"pending""#));

        let back: CheckInEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_same_subject() {
        let entry = entry(AttendanceMark::Present);
        let reception = Station::new("reception").unwrap();
        assert!(entry.same_subject(&GuestId::from(1001), &reception, AttendanceMark::Present));
        assert!(!entry.same_subject(&GuestId::from(1001), &reception, AttendanceMark::Absent));
        assert!(!entry.same_subject(&GuestId::from(1002), &reception, AttendanceMark::Present));
    }
}
