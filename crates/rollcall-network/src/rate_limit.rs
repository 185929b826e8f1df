//! Client-side request pacing.
//!
//! The directory API publishes a per-minute quota. [`RateLimiter`] counts
//! requests in fixed windows and, once the window's budget is spent, makes
//! the caller wait for the next window instead of failing the request.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

/// Fixed-window request limiter shared by clones.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateWindow>>,
    window: Duration,
    limit: u32,
}

impl RateLimiter {
    /// Allow `limit` requests per `window`. A limit of zero disables pacing.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateWindow {
                started_at: Instant::now(),
                count: 0,
            })),
            window,
            limit,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Take one slot, sleeping until the next window when the budget is spent.
    ///
    /// The lock is held while sleeping so waiting callers are served in order.
    pub async fn acquire(&self) {
        if self.limit == 0 {
            return;
        }

        let mut window = self.state.lock().await;
        let now = Instant::now();
        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.limit {
            let resume_at = window.started_at + self.window;
            debug!(
                limit = self.limit,
                wait = ?resume_at.saturating_duration_since(now),
                "request budget spent, waiting for next window"
            );
            tokio::time::sleep_until(resume_at).await;
            window.started_at = Instant::now();
            window.count = 0;
        }

        window.count += 1;
    }

    /// Requests left in the current window.
    pub async fn remaining(&self) -> u32 {
        let window = self.state.lock().await;
        if Instant::now().duration_since(window.started_at) >= self.window {
            return self.limit;
        }
        self.limit.saturating_sub(window.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }

        assert_eq!(limiter.remaining().await, 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_next_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(limiter.remaining().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_disables_pacing() {
        let limiter = RateLimiter::per_minute(0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
