//! Client-side rate limiter for search provider requests.
//!
//! Proactively throttles requests to stay within a provider's published
//! limits instead of relying on 429 backpressure. Two rules apply: at most
//! `requests_per_minute` requests in any sliding minute, and at least
//! `min_interval` between consecutive requests.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests per window (0 = unlimited).
    requests_per_window: usize,
    min_interval: Duration,
    /// Start times of recent and already-booked requests, ascending.
    requests: VecDeque<Instant>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: usize, min_interval: Duration) -> Self {
        Self {
            requests_per_window: requests_per_minute,
            min_interval,
            requests: VecDeque::new(),
            window: Duration::from_secs(60),
        }
    }

    /// A limiter that never delays.
    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Book the earliest available slot and return how long to wait for it.
    ///
    /// Concurrent callers sharing the limiter behind a mutex each get a
    /// distinct slot, so they do not all wake at the same instant.
    pub fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let slot = self.next_slot(now);
        self.requests.push_back(slot);
        slot.saturating_duration_since(now)
    }

    fn next_slot(&mut self, now: Instant) -> Instant {
        self.prune(now);
        let mut slot = now;
        if let Some(&last) = self.requests.back() {
            slot = slot.max(last + self.min_interval);
        }
        if self.requests_per_window > 0 && self.requests.len() >= self.requests_per_window {
            let idx = self.requests.len() - self.requests_per_window;
            slot = slot.max(self.requests[idx] + self.window);
        }
        slot
    }

    /// Remove entries older than the sliding window.
    fn prune(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        while self.requests.front().is_some_and(|t| *t < cutoff) {
            self.requests.pop_front();
        }
    }
}

/// Parse a `Retry-After` header (seconds or fractional seconds).
///
/// Falls back to a conservative delay when the header is present but
/// unparseable (e.g. an HTTP date).
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after").and_then(|v| v.to_str().ok())?;

    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Some(secs) = value
        .trim()
        .strip_suffix('s')
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
    {
        return Some(Duration::from_secs_f64(secs));
    }
    Some(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_limiter_no_limits() {
        let mut limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            assert!(limiter.reserve().is_zero());
        }
    }

    #[test]
    fn test_limiter_rpm() {
        let mut limiter = RateLimiter::new(2, Duration::ZERO);

        assert!(limiter.reserve().is_zero());
        assert!(limiter.reserve().is_zero());

        // The third request waits for the first to leave the window.
        let delay = limiter.reserve();
        assert!(delay.as_secs() > 50, "{delay:?}");
        // And the fourth for the second.
        assert!(limiter.reserve().as_secs() > 50);
    }

    #[test]
    fn test_limiter_min_interval_spaces_reservations() {
        let mut limiter = RateLimiter::new(0, Duration::from_millis(100));
        assert!(limiter.reserve().is_zero());
        let second = limiter.reserve();
        let third = limiter.reserve();
        assert!(second > Duration::from_millis(50));
        assert!(third > second);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert!(parse_retry_after(&headers).is_none());

        headers.insert("retry-after", HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert("retry-after", HeaderValue::from_static("0.5s"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(500)));

        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(60)));
    }
}
