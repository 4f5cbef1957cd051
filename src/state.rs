use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::mailer::Mailer;
use crate::rate_limit::RateLimiter;

/// Everything the handlers share. Built once in main and injected through
/// axum state; there are no globals.
pub struct AppState<T> {
    pub config: Config,
    pub mailer: Mailer<T>,
    pub rate_limiter: RateLimiter,
    pub stats: SendStats,
}

/// Send counters for the stats endpoint. In memory only; reset on restart.
#[derive(Default)]
pub struct SendStats {
    total_sent: AtomicU64,
    total_failed: AtomicU64,
    last_sent: Mutex<Option<DateTime<Utc>>>,
}

impl SendStats {
    pub fn record_sent(&self) {
        self.total_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_sent.lock().expect("stats lock poisoned") = Some(Utc::now());
    }

    pub fn record_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed.load(Ordering::Relaxed)
    }

    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        *self.last_sent.lock().expect("stats lock poisoned")
    }
}
