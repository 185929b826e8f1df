use crate::{
    Result,
    constants::{ABSENT_SENTINEL, MAX_TAG_UID_BYTES, MIN_TAG_UID_BYTES},
    error::Error,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware identifier of an NFC tag, normalized to uppercase hex.
///
/// Separators commonly printed by reader tools (`:`, `-`, spaces) are
/// stripped, so `"04:a1"` and `"04A1"` are the same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagUid(String);

impl TagUid {
    /// Create a tag UID from its hex representation.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagUid` if the value is not hex, has an odd
    /// number of digits, or is outside the 2-10 byte range.
    pub fn new(uid: &str) -> Result<Self> {
        let normalized: String = uid
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect::<String>()
            .to_uppercase();

        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidTagUid(format!("not hexadecimal: {uid}")));
        }

        if normalized.len() % 2 != 0 {
            return Err(Error::InvalidTagUid(format!(
                "odd number of hex digits: {uid}"
            )));
        }

        let bytes = normalized.len() / 2;
        if !(MIN_TAG_UID_BYTES..=MAX_TAG_UID_BYTES).contains(&bytes) {
            return Err(Error::InvalidTagUid(format!(
                "UID must be {MIN_TAG_UID_BYTES}-{MAX_TAG_UID_BYTES} bytes, got {bytes}"
            )));
        }

        Ok(TagUid(normalized))
    }

    /// Create a tag UID from raw bytes reported by a reader.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagUid` if the length is out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        TagUid::new(&hex)
    }

    /// Get the UID as an uppercase hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagUid::new(s)
    }
}

impl TryFrom<String> for TagUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TagUid::new(&value)
    }
}

impl From<TagUid> for String {
    fn from(value: TagUid) -> Self {
        value.0
    }
}

/// Identifier of a guest in the remote guest directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestId(String);

/// Maximum length of a guest identifier.
const MAX_GUEST_ID_LENGTH: usize = 64;

impl GuestId {
    /// Create a guest id. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    /// Returns `Error::InvalidGuestId` if the id is empty, too long, or
    /// contains control characters.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() {
            return Err(Error::InvalidGuestId("guest id cannot be empty".to_string()));
        }

        if id.len() > MAX_GUEST_ID_LENGTH {
            return Err(Error::InvalidGuestId(format!(
                "guest id longer than {MAX_GUEST_ID_LENGTH} chars"
            )));
        }

        if id.chars().any(char::is_control) {
            return Err(Error::InvalidGuestId(format!(
                "guest id contains control characters: {id:?}"
            )));
        }

        Ok(GuestId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GuestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        GuestId::new(s)
    }
}

impl From<u64> for GuestId {
    fn from(value: u64) -> Self {
        GuestId(value.to_string())
    }
}

impl TryFrom<String> for GuestId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        GuestId::new(&value)
    }
}

impl From<GuestId> for String {
    fn from(value: GuestId) -> Self {
        value.0
    }
}

/// A physical check-in point.
///
/// Each station owns one column in the remote directory. The column key is
/// derived from the display name: lowercase, whitespace runs collapsed to
/// `_` (`"Main Hall"` becomes `main_hall`). Two stations are equal when
/// their keys are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Station {
    name: String,
    key: String,
}

impl Station {
    /// Create a station from its display name.
    ///
    /// # Errors
    /// Returns `Error::InvalidStation` if the name is blank.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidStation(
                "station name cannot be empty".to_string(),
            ));
        }

        let key = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();

        Ok(Station {
            name: name.to_string(),
            key,
        })
    }

    /// Display name as configured.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column key used by the remote directory.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Station {}

impl std::hash::Hash for Station {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl std::str::FromStr for Station {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Station::new(s)
    }
}

impl TryFrom<String> for Station {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Station::new(&value)
    }
}

impl From<Station> for String {
    fn from(value: Station) -> Self {
        value.name
    }
}

/// Attendance fact recorded for a guest at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMark {
    /// Guest was detected at the station.
    Present,

    /// Operator explicitly marked the guest absent.
    Absent,
}

impl AttendanceMark {
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

/// Value of one station cell in the remote directory.
///
/// Cells are edited by hand as well as by stations, so deserialization never
/// fails: text that is neither a timestamp nor the absent sentinel is kept
/// as [`CellValue::Unrecognized`], and `null` reads as an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum CellValue {
    /// Nothing recorded yet.
    #[default]
    Empty,

    /// Guest checked in at the given instant.
    CheckedIn(DateTime<Utc>),

    /// Guest explicitly marked absent.
    Absent,

    /// Free text typed into the cell by hand, e.g. "yes".
    Unrecognized(String),
}

impl CellValue {
    /// Parse a cell as it appears in the spreadsheet.
    ///
    /// Accepts RFC 3339 timestamps and the `YYYY-MM-DD HH:MM:SS` form typed
    /// by hand into the sheet (interpreted as UTC).
    ///
    /// # Errors
    /// Returns `Error::InvalidCellValue` for anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_core::CellValue;
    ///
    /// assert_eq!(CellValue::parse("").unwrap(), CellValue::Empty);
    /// assert_eq!(CellValue::parse("absent").unwrap(), CellValue::Absent);
    /// assert!(CellValue::parse("2025-03-01T09:15:00Z").unwrap().checked_in_at().is_some());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Ok(Self::Empty);
        }

        if raw.eq_ignore_ascii_case(ABSENT_SENTINEL) {
            return Ok(Self::Absent);
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::CheckedIn(ts.with_timezone(&Utc)));
        }

        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .map(|naive| Self::CheckedIn(naive.and_utc()))
            .map_err(|_| Error::InvalidCellValue(raw.to_string()))
    }

    /// Parse a cell, keeping text [`parse`](Self::parse) rejects as
    /// [`CellValue::Unrecognized`].
    ///
    /// ```
    /// use rollcall_core::CellValue;
    ///
    /// assert_eq!(CellValue::from_wire("yes"), CellValue::Unrecognized("yes".to_string()));
    /// assert_eq!(CellValue::from_wire("ABSENT"), CellValue::Absent);
    /// ```
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|_| {
            tracing::warn!(cell = raw, "unrecognized cell value, treating as occupied");
            Self::Unrecognized(raw.trim().to_string())
        })
    }

    /// Render the cell for the spreadsheet.
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::CheckedIn(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Absent => ABSENT_SENTINEL.to_string(),
            Self::Unrecognized(text) => text.clone(),
        }
    }

    /// Check-in instant, if the cell holds one.
    #[must_use]
    pub fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::CheckedIn(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from_wire(&value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

impl From<CellValue> for String {
    fn from(value: CellValue) -> Self {
        value.to_wire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("04A1", "04A1")]
    #[case("04:a1:b2:c3", "04A1B2C3")]
    #[case(" 04-ab-cd-ef ", "04ABCDEF")]
    #[case("0102030405060708090A", "0102030405060708090A")]
    fn test_tag_uid_valid(#[case] input: &str, #[case] expected: &str) {
        let uid: TagUid = input.parse().unwrap();
        assert_eq!(uid.as_str(), expected);
    }

    #[rstest]
    #[case("")] // empty
    #[case("0")] // odd
    #[case("04A")] // odd
    #[case("ZZ11")] // not hex
    #[case("0102030405060708090A0B")] // 11 bytes
    fn test_tag_uid_invalid(#[case] input: &str) {
        let result: Result<TagUid> = input.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_tag_uid_from_bytes() {
        let uid = TagUid::from_bytes(&[0x04, 0xAB, 0xCD, 0xEF]).unwrap();
        assert_eq!(uid.as_str(), "04ABCDEF");
    }

    #[rstest]
    #[case("1001", "1001")]
    #[case("  G-17 ", "G-17")]
    fn test_guest_id_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(GuestId::new(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("a\nb")]
    fn test_guest_id_invalid(#[case] input: &str) {
        assert!(GuestId::new(input).is_err());
    }

    #[test]
    fn test_guest_id_from_integer() {
        assert_eq!(GuestId::from(1001).as_str(), "1001");
    }

    #[rstest]
    #[case("Reception", "reception")]
    #[case("  Main   Hall ", "main_hall")]
    #[case("VIP", "vip")]
    fn test_station_key(#[case] name: &str, #[case] key: &str) {
        let station = Station::new(name).unwrap();
        assert_eq!(station.key(), key);
    }

    #[test]
    fn test_station_equality_uses_key() {
        assert_eq!(
            Station::new("Main Hall").unwrap(),
            Station::new("main hall").unwrap()
        );
        assert!(Station::new("  ").is_err());
    }

    #[test]
    fn test_cell_value_parse() {
        assert_eq!(CellValue::parse("  ").unwrap(), CellValue::Empty);
        assert_eq!(CellValue::parse("ABSENT").unwrap(), CellValue::Absent);

        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 9, 15, 0).unwrap();
        assert_eq!(
            CellValue::parse("2025-03-01 09:15:00").unwrap(),
            CellValue::CheckedIn(expected)
        );
        assert_eq!(
            CellValue::parse("2025-03-01T09:15:00+00:00").unwrap(),
            CellValue::CheckedIn(expected)
        );
        assert!(CellValue::parse("yesterday").is_err());
        assert_eq!(
            CellValue::from_wire(" yesterday "),
            CellValue::Unrecognized("yesterday".to_string())
        );
    }

    #[test]
    fn test_cell_value_deserialize_never_fails() {
        let cells: Vec<CellValue> =
            serde_json::from_str(r#"["yes", null, "", "ABSENT"]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Unrecognized("yes".to_string()),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Absent,
            ]
        );
    }

    #[test]
    fn test_cell_value_wire_format() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 9, 15, 0).unwrap();
        assert_eq!(CellValue::CheckedIn(ts).to_wire(), "2025-03-01T09:15:00Z");
        assert_eq!(CellValue::Absent.to_wire(), "ABSENT");
        assert_eq!(CellValue::Empty.to_wire(), "");
    }

    #[test]
    fn test_serde_uses_strings() {
        let uid = TagUid::new("04a1").unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"04A1\"");

        let station: Station = serde_json::from_str("\"Main Hall\"").unwrap();
        assert_eq!(station.key(), "main_hall");

        let bad: std::result::Result<TagUid, _> = serde_json::from_str("\"xyz\"");
        assert!(bad.is_err());
    }
}
