use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use qsa_interface::{ErrorCode, WorkflowError, WorkflowResult};

/// Default public-lookup window.
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Default requests allowed per window per source address.
pub const DEFAULT_MAX_REQUESTS: u32 = 30;

/// Fixed-window per-source-IP limiter guarding the public serial lookup.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    hits: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_WINDOW_SECS), DEFAULT_MAX_REQUESTS)
    }
}

impl RateLimiter {
    /// Creates a limiter with the given window and per-window maximum.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request from `source`, failing once the window's
    /// budget is spent.
    pub fn check(&self, source: IpAddr) -> WorkflowResult<()> {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        // Drop stale windows so the map stays bounded by active sources.
        hits.retain(|_, (start, _)| now.duration_since(*start) < self.window);

        let entry = hits.entry(source).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        if entry.1 > self.max_requests {
            return Err(WorkflowError::new(
                ErrorCode::RateLimited,
                "lookup rate limit exceeded, slow down",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([192, 0, 2, last])
    }

    #[test]
    fn allows_up_to_the_maximum_then_rejects() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        for _ in 0..3 {
            limiter.check(ip(1)).unwrap();
        }
        let err = limiter.check(ip(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
    }

    #[test]
    fn sources_are_tracked_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        limiter.check(ip(1)).unwrap();
        limiter.check(ip(2)).unwrap();
        assert!(limiter.check(ip(1)).is_err());
    }

    #[test]
    fn budget_resets_after_the_window() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);
        limiter.check(ip(1)).unwrap();
        assert!(limiter.check(ip(1)).is_err());
        std::thread::sleep(Duration::from_millis(25));
        limiter.check(ip(1)).unwrap();
    }
}
