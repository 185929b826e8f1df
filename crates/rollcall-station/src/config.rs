//! Station configuration

use rollcall_core::Station;
use rollcall_core::constants::DEFAULT_SCAN_PERIOD_MS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity and pacing of one check-in point
///
/// # Example
///
/// ```
/// use rollcall_station::StationConfig;
///
/// let config = StationConfig::new("Main Hall");
/// assert_eq!(config.station().unwrap().key(), "main_hall");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Display name; its column key addresses the directory
    pub station: String,

    /// Pause between reader polls in milliseconds
    pub scan_period_ms: u64,
}

impl StationConfig {
    pub fn new(station: impl Into<String>) -> Self {
        Self {
            station: station.into(),
            ..Self::default()
        }
    }

    pub fn with_scan_period(mut self, period: Duration) -> Self {
        self.scan_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidStation` for an empty name.
    pub fn station(&self) -> rollcall_core::Result<Station> {
        Station::new(&self.station)
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            station: "Reception".to_string(),
            scan_period_ms: DEFAULT_SCAN_PERIOD_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Reception", Some("reception"))]
    #[case("  Main   Hall ", Some("main_hall"))]
    #[case("", None)]
    #[case("   ", None)]
    fn test_station_name(#[case] name: &str, #[case] key: Option<&str>) {
        let station = StationConfig::new(name).station().ok();
        assert_eq!(station.as_ref().map(Station::key), key);
    }

    #[rstest]
    #[case(Duration::from_millis(50), 50)]
    #[case(Duration::MAX, u64::MAX)]
    fn test_scan_period_saturates(#[case] period: Duration, #[case] expected_ms: u64) {
        let config = StationConfig::default().with_scan_period(period);
        assert_eq!(config.scan_period_ms, expected_ms);
    }
}
