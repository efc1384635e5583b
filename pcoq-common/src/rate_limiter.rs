//! Sliding-window rate limiter for outbound API calls
//!
//! Keeps the issue times of recent calls. A caller is admitted when fewer than
//! `max_per_window` calls were issued during the trailing window; otherwise it
//! sleeps until the oldest retained call leaves the window.
//!
//! The timestamp record sits behind a FIFO async mutex that stays locked
//! while a caller sleeps, so concurrent callers are admitted one at a time in
//! arrival order and no burst can exceed the ceiling.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Default ceiling for the PCO People API
pub const DEFAULT_MAX_PER_SECOND: u32 = 2;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Admission control shared by every outbound call
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_per_window: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Limiter admitting `max_per_second` calls per rolling second
    ///
    /// A ceiling of 0 is treated as 1.
    pub fn new(max_per_second: u32) -> Self {
        Self::with_window(max_per_second, ONE_SECOND)
    }

    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        let max_per_window = max_per_window.max(1) as usize;
        Self {
            max_per_window,
            window,
            issued: Mutex::new(VecDeque::with_capacity(max_per_window)),
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a call may be issued, then record it
    ///
    /// Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let mut issued = self.issued.lock().await;
        let started = Instant::now();

        loop {
            let now = Instant::now();
            while let Some(&oldest) = issued.front() {
                if now.duration_since(oldest) >= self.window {
                    issued.pop_front();
                } else {
                    break;
                }
            }

            if issued.len() < self.max_per_window {
                break;
            }

            // Non-empty: len >= max_per_window >= 1
            let oldest = issued[0];
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiting: waiting");
            tokio::time::sleep(wait).await;
        }

        issued.push_back(Instant::now());
        started.elapsed()
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_SECOND)
    }
}
