//! Per-model cooldown tracking for the fallback router.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default cooldown window after a rate-limit observation.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct CooldownEntry {
    rate_limited_at: Instant,
    status_codes: Vec<u16>,
}

/// Tracks which models were recently rate limited. A model is "in
/// cooldown" for the configured window measured from its last rate-limited
/// observation. Single writer per operation; concurrent readers share a
/// rw-lock.
#[derive(Debug)]
pub struct CooldownTracker {
    entries: RwLock<HashMap<String, CooldownEntry>>,
    window: Duration,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CooldownTracker {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Record a rate-limited observation for `model` with the upstream
    /// status code. Re-observations extend the window.
    pub fn record(&self, model: &str, status: u16) {
        let mut entries = self.entries.write().expect("cooldown lock");
        let entry = entries
            .entry(model.to_string())
            .or_insert_with(|| CooldownEntry {
                rate_limited_at: Instant::now(),
                status_codes: Vec::new(),
            });
        entry.rate_limited_at = Instant::now();
        entry.status_codes.push(status);
    }

    /// Whether `model` is still inside its cooldown window.
    #[must_use]
    pub fn is_in_cooldown(&self, model: &str) -> bool {
        self.entries
            .read()
            .expect("cooldown lock")
            .get(model)
            .is_some_and(|entry| entry.rate_limited_at.elapsed() < self.window)
    }

    /// Status codes observed for `model` since process start.
    #[must_use]
    pub fn statuses(&self, model: &str) -> Vec<u16> {
        self.entries
            .read()
            .expect("cooldown lock")
            .get(model)
            .map(|entry| entry.status_codes.clone())
            .unwrap_or_default()
    }

    /// Drop all state. For tests.
    pub fn clear(&self) {
        self.entries.write().expect("cooldown lock").clear();
    }
}
