use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
pub(crate) struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    pub(crate) fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Minimum spacing between successive scraping-backend requests.
///
/// Callers queue on a fair mutex and each one reserves its own slot, so no two
/// admitted requests are closer than `min_interval`. Waiting is unbounded.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    limiter: Mutex<IntervalLimiter>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            limiter: Mutex::new(IntervalLimiter::new(min_interval)),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until this caller's slot arrives.
    pub async fn acquire(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}
