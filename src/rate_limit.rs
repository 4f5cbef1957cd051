use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fixed-window send counter, shared by all requests.
///
/// Check-and-increment happens in a single critical section so two
/// concurrent requests at `limit - 1` cannot both be admitted.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    inner: Mutex<Window>,
}

struct Window {
    count: u32,
    started_at: Instant,
    // wall-clock twin of started_at, for the stats endpoint
    started_at_utc: DateTime<Utc>,
}

/// Read-only view of the current window for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WindowSnapshot {
    pub limit: u32,
    pub window_secs: u64,
    pub current_count: u32,
    pub window_started_at: DateTime<Utc>,
    pub resets_in_secs: u64,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            limit,
            window,
            inner: Mutex::new(Window {
                count: 0,
                started_at: Instant::now(),
                started_at_utc: Utc::now(),
            }),
        }
    }

    /// Reserve a slot in the current window, or return the time remaining
    /// until the window resets.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        let mut w = self.inner.lock().expect("rate limiter lock poisoned");

        let elapsed = now.duration_since(w.started_at);
        if elapsed >= self.window {
            // window expired, start a fresh one with this request counted
            w.count = 1;
            w.started_at = now;
            w.started_at_utc = Utc::now();
            return Ok(());
        }

        if w.count < self.limit {
            w.count += 1;
            return Ok(());
        }

        Err(self.window - elapsed)
    }

    /// Return a reserved slot after a failed delivery, so the counter only
    /// reflects successful sends.
    pub fn release(&self) {
        let mut w = self.inner.lock().expect("rate limiter lock poisoned");
        w.count = w.count.saturating_sub(1);
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        let w = self.inner.lock().expect("rate limiter lock poisoned");
        let elapsed = w.started_at.elapsed();
        WindowSnapshot {
            limit: self.limit,
            window_secs: self.window.as_secs(),
            current_count: w.count,
            window_started_at: w.started_at_utc,
            resets_in_secs: self.window.saturating_sub(elapsed).as_secs(),
        }
    }
}
