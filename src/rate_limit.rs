use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::debug;

/// Keeps consecutive requests to one service at least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Interval given in (possibly fractional) seconds. Negative or
    /// non-finite values disable limiting.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until the next request is allowed, then records it.
    pub fn acquire(&mut self) {
        if let Some(wait) = self.time_until_ready() {
            debug!("Rate limiter: waiting {}ms", wait.as_millis());
            sleep(wait);
        }
        self.last_request = Some(Instant::now());
    }

    /// Remaining wait before the next request, if any.
    pub fn time_until_ready(&self) -> Option<Duration> {
        let elapsed = self.last_request?.elapsed();
        (elapsed < self.min_interval).then(|| self.min_interval - elapsed)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
