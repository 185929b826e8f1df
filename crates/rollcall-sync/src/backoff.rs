//! Exponential retry delay keyed on attempt count.

use std::time::Duration;

/// `min(base * 2^(attempts - 1), max)`; no delay before the first attempt.
///
/// ```
/// use rollcall_sync::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));
/// assert_eq!(backoff.delay(0), Duration::ZERO);
/// assert_eq!(backoff.delay(1), Duration::from_secs(5));
/// assert_eq!(backoff.delay(3), Duration::from_secs(20));
/// assert_eq!(backoff.delay(30), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempts - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// [`delay`](Self::delay) as a chrono duration, for comparing with ledger timestamps.
    pub fn chrono_delay(&self, attempts: u32) -> chrono::Duration {
        chrono::Duration::from_std(self.delay(attempts)).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 5)]
    #[case(2, 10)]
    #[case(4, 40)]
    #[case(6, 160)]
    #[case(7, 300)]
    #[case(32, 300)]
    #[case(u32::MAX, 300)]
    fn test_delay_doubles_then_caps(#[case] attempts: u32, #[case] secs: u64) {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));
        assert_eq!(backoff.delay(attempts), Duration::from_secs(secs));
    }

    #[test]
    fn test_max_never_below_base() {
        let backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(5), Duration::from_secs(10));
    }

    #[test]
    fn test_chrono_delay() {
        let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));
        assert_eq!(backoff.chrono_delay(2), chrono::Duration::seconds(10));
    }
}
