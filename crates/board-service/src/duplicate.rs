//! Short-term memory of normalized message bodies.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Collapses whitespace runs to one space, trims, and lower-cases.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Rejects bodies already seen within `window`. A zero window disables it.
pub struct DuplicateSuppressor {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DuplicateSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_duplicate(&self, text: &str) -> bool {
        self.is_duplicate_at(text, Instant::now())
    }

    /// Returns `true` if `text` was registered and has not expired.
    /// Otherwise registers it until `now + window` and returns `false`.
    ///
    /// Expired entries are purged first, on every call.
    pub fn is_duplicate_at(&self, text: &str, now: Instant) -> bool {
        if self.window.is_zero() {
            return false;
        }

        let key = normalize(text);
        let mut seen = self.seen.lock();
        seen.retain(|_, expires_at| *expires_at > now);

        if seen.contains_key(&key) {
            return true;
        }
        seen.insert(key, now + self.window);
        false
    }

    /// Number of bodies currently remembered (expired ones included until the
    /// next check).
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
