//! Per-client rate limiting with a fixed-window counter and a minimum
//! spacing between accepted requests.
//!
//! Transport-agnostic core. The HTTP crate resolves the client key (first
//! `X-Forwarded-For` hop, `X-Real-IP`, or `"unknown"`) and calls `check()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the client may try again. At least 1 when denied.
    pub retry_after_secs: u64,
}

impl RateDecision {
    fn allow(remaining: Duration) -> Self {
        Self {
            allowed: true,
            retry_after_secs: ceil_secs(remaining),
        }
    }

    fn deny(remaining: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_secs: ceil_secs(remaining).max(1),
        }
    }
}

/// In-memory per-client rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    max_requests: u64,
    window: Duration,
    min_interval: Duration,
    entries: DashMap<String, RateEntry>,
}

#[derive(Debug, Clone, Copy)]
struct RateEntry {
    count: u64,
    reset_at: Instant,
    last_accepted: Instant,
}

impl RateEntry {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
            last_accepted: now,
        }
    }
}

impl RateLimiter {
    /// Creates a new rate limiter.
    ///
    /// `max_requests = 0` turns off the window count only. `min_interval`
    /// still applies unless it is zero too.
    pub fn new(max_requests: u64, window: Duration, min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                max_requests,
                window,
                min_interval,
                entries: DashMap::new(),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.max_requests > 0 || !self.inner.min_interval.is_zero()
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Checks and records a request from `key` as of `now`.
    ///
    /// The shard lock of the entry is held for the whole read-modify-write,
    /// so concurrent requests for one key cannot both take the last slot.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let inner = &self.inner;
        if !self.is_enabled() {
            return RateDecision::allow(Duration::ZERO);
        }

        let span = inner.span();

        match inner.entries.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(RateEntry::open(now, span));
                RateDecision::allow(span)
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if entry.reset_at <= now {
                    *entry = RateEntry::open(now, span);
                    return RateDecision::allow(span);
                }

                let since_last = now.saturating_duration_since(entry.last_accepted);
                if since_last < inner.min_interval {
                    return RateDecision::deny(inner.min_interval - since_last);
                }

                let until_reset = entry.reset_at.saturating_duration_since(now);
                if inner.max_requests > 0 && entry.count >= inner.max_requests {
                    return RateDecision::deny(until_reset);
                }

                entry.count += 1;
                entry.last_accepted = now;
                RateDecision::allow(until_reset)
            }
        }
    }

    /// Number of client keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.entries.len()
    }

    /// Removes entries whose window has expired (background cleanup).
    ///
    /// An expired entry would be reset by the next request anyway, so this
    /// only reclaims memory. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| entry.reset_at > now);
        before.saturating_sub(self.inner.entries.len())
    }
}

impl RateLimiterInner {
    /// How long an entry lives. Without a window count an entry only has to
    /// outlast the minimum interval.
    fn span(&self) -> Duration {
        if self.max_requests == 0 {
            self.min_interval
        } else {
            self.window
        }
    }
}

/// Rounds a duration up to whole seconds.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn seventh_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(6, MINUTE, Duration::ZERO);
        let start = Instant::now();

        for i in 0..6 {
            let d = limiter.check_at("10.0.0.1", start + Duration::from_secs(i));
            assert!(d.allowed, "request {i} should pass");
        }

        let denied = limiter.check_at("10.0.0.1", start + Duration::from_secs(6));
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 54);
    }

    #[test]
    fn min_interval_is_enforced_independently() {
        let limiter = RateLimiter::new(6, MINUTE, Duration::from_secs(8));
        let start = Instant::now();

        assert!(limiter.check_at("a", start).allowed);
        let too_soon = limiter.check_at("a", start + Duration::from_millis(2500));
        assert!(!too_soon.allowed);
        assert_eq!(too_soon.retry_after_secs, 6);

        assert!(limiter.check_at("a", start + Duration::from_secs(8)).allowed);
    }

    #[test]
    fn rejected_request_does_not_move_last_accepted() {
        let limiter = RateLimiter::new(6, MINUTE, Duration::from_secs(8));
        let start = Instant::now();

        assert!(limiter.check_at("a", start).allowed);
        assert!(!limiter.check_at("a", start + Duration::from_secs(5)).allowed);
        // Still measured from the first request, not the rejected one.
        assert!(limiter.check_at("a", start + Duration::from_secs(8)).allowed);
    }

    #[test]
    fn expired_window_starts_over() {
        let limiter = RateLimiter::new(2, MINUTE, Duration::ZERO);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).allowed);
        assert!(limiter.check_at("a", start).allowed);
        assert!(!limiter.check_at("a", start + Duration::from_secs(1)).allowed);

        let fresh = limiter.check_at("a", start + MINUTE);
        assert!(fresh.allowed);
        assert_eq!(fresh.retry_after_secs, 60);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, MINUTE, Duration::ZERO);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
        assert!(limiter.check_at("unknown", now).allowed);
        assert_eq!(limiter.tracked(), 3);
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(0, MINUTE, Duration::ZERO);
        assert!(!limiter.is_enabled());
        let now = Instant::now();
        for _ in 0..100 {
            assert!(limiter.check_at("a", now).allowed);
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn min_interval_applies_without_window_limit() {
        let limiter = RateLimiter::new(0, MINUTE, Duration::from_secs(8));
        assert!(limiter.is_enabled());
        let start = Instant::now();

        for i in 0..10 {
            let at = start + Duration::from_secs(8 * i);
            assert!(limiter.check_at("a", at).allowed, "request {i} should pass");
        }
        let too_soon = limiter.check_at("a", start + Duration::from_secs(75));
        assert!(!too_soon.allowed);
        assert_eq!(too_soon.retry_after_secs, 5);

        // Entries only live as long as the spacing.
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(80)), 1);
    }

    #[test]
    fn sweep_removes_only_expired_windows() {
        let limiter = RateLimiter::new(5, MINUTE, Duration::ZERO);
        let start = Instant::now();

        limiter.check_at("old", start);
        limiter.check_at("new", start + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(start + MINUTE), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(Duration::ZERO), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1000)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1001)), 2);
    }
}
