//! Lightweight Prometheus-compatible metrics using atomic counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::error::{ALL_CODES, ServiceError};

/// Application-wide metrics collected via atomic counters.
pub struct Metrics {
    posts_accepted: AtomicU64,
    /// One counter per entry of [`ALL_CODES`].
    errors: [AtomicU64; ALL_CODES.len()],
    feed_subscribers: AtomicI64,
    feed_dropped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            posts_accepted: AtomicU64::new(0),
            errors: [const { AtomicU64::new(0) }; ALL_CODES.len()],
            feed_subscribers: AtomicI64::new(0),
            feed_dropped: AtomicU64::new(0),
        }
    }

    /// Record a post that reached the store.
    pub fn record_accepted(&self) {
        self.posts_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected or failed submission under its error code.
    pub fn record_error(&self, err: &ServiceError) {
        if let Some(slot) = ALL_CODES.iter().position(|c| *c == err.code()) {
            self.errors[slot].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn feed_opened(&self) {
        self.feed_subscribers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn feed_closed(&self) {
        self.feed_subscribers.fetch_sub(1, Ordering::Relaxed);
    }

    /// Events a lagging subscriber never received.
    pub fn feed_lagged(&self, skipped: u64) {
        self.feed_dropped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn feed_dropped(&self) -> u64 {
        self.feed_dropped.load(Ordering::Relaxed)
    }

    pub fn posts_accepted(&self) -> u64 {
        self.posts_accepted.load(Ordering::Relaxed)
    }

    pub fn errors(&self, code: &str) -> u64 {
        ALL_CODES
            .iter()
            .position(|c| *c == code)
            .map_or(0, |slot| self.errors[slot].load(Ordering::Relaxed))
    }

    pub fn feed_subscribers(&self) -> i64 {
        self.feed_subscribers.load(Ordering::Relaxed)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self, tracked_clients: usize, uptime_seconds: u64) -> String {
        let mut out = String::with_capacity(1024);

        gauge(
            &mut out,
            "board_feed_subscribers",
            "Open change feed connections",
            self.feed_subscribers(),
        );
        gauge(
            &mut out,
            "board_rate_limit_clients",
            "Client keys tracked by the rate limiter",
            tracked_clients,
        );
        gauge(
            &mut out,
            "board_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds,
        );

        writeln!(out, "# HELP board_posts_accepted_total Posts written to the store.").unwrap();
        writeln!(out, "# TYPE board_posts_accepted_total counter").unwrap();
        writeln!(out, "board_posts_accepted_total {}", self.posts_accepted()).unwrap();

        writeln!(
            out,
            "# HELP board_feed_dropped_total Change events skipped by lagging subscribers."
        )
        .unwrap();
        writeln!(out, "# TYPE board_feed_dropped_total counter").unwrap();
        writeln!(out, "board_feed_dropped_total {}", self.feed_dropped()).unwrap();

        writeln!(
            out,
            "# HELP board_post_errors_total Rejected or failed submissions."
        )
        .unwrap();
        writeln!(out, "# TYPE board_post_errors_total counter").unwrap();
        for (slot, code) in ALL_CODES.iter().enumerate() {
            let count = self.errors[slot].load(Ordering::Relaxed);
            writeln!(out, "board_post_errors_total{{reason=\"{code}\"}} {count}").unwrap();
        }

        out
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} gauge").unwrap();
    writeln!(out, "{name} {value}").unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_reason() {
        let m = Metrics::new();
        m.record_accepted();
        m.record_error(&ServiceError::Duplicate);
        m.record_error(&ServiceError::Duplicate);
        m.record_error(&ServiceError::RateLimited { retry_after_secs: 3 });

        assert_eq!(m.posts_accepted(), 1);
        assert_eq!(m.errors("duplicate"), 2);
        assert_eq!(m.errors("rate_limited"), 1);
        assert_eq!(m.errors("forbidden"), 0);
        assert_eq!(m.errors("no_such_code"), 0);
    }

    #[test]
    fn render_contains_every_reason() {
        let m = Metrics::new();
        m.feed_opened();
        m.record_error(&ServiceError::LinksNotAllowed);

        let text = m.render(4, 12);
        assert!(text.contains("board_feed_subscribers 1"));
        assert!(text.contains("board_rate_limit_clients 4"));
        assert!(text.contains("board_uptime_seconds 12"));
        assert!(text.contains("board_posts_accepted_total 0"));
        assert!(text.contains("board_post_errors_total{reason=\"links_not_allowed\"} 1"));
        for code in ALL_CODES {
            assert!(text.contains(&format!("reason=\"{code}\"")));
        }
    }

    #[test]
    fn feed_gauge_goes_up_and_down() {
        let m = Metrics::new();
        m.feed_opened();
        m.feed_opened();
        m.feed_closed();
        assert_eq!(m.feed_subscribers(), 1);
    }

    #[test]
    fn dropped_feed_events_accumulate() {
        let m = Metrics::new();
        m.feed_lagged(10);
        m.feed_lagged(5);
        assert_eq!(m.feed_dropped(), 15);
        assert!(m.render(0, 0).contains("board_feed_dropped_total 15"));
    }
}
