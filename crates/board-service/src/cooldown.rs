//! Process-wide minimum spacing between posts, independent of client key.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Single shared timestamp gate. A zero cooldown disables it.
pub struct GlobalCooldown {
    cooldown: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl GlobalCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.try_acquire_at(Instant::now())
    }

    /// Takes the slot if the cooldown has elapsed since the last taker.
    ///
    /// On success the timestamp moves to `now` before returning; callers
    /// that later reject the request do not give the slot back. On failure
    /// the remaining wait is returned.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Duration> {
        if self.cooldown.is_zero() {
            return Ok(());
        }

        let mut last = self.last_accepted.lock();
        if let Some(prev) = *last {
            let elapsed = now.saturating_duration_since(prev);
            if elapsed < self.cooldown {
                return Err(self.cooldown - elapsed);
            }
        }
        *last = Some(now);
        Ok(())
    }
}
