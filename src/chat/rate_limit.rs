//! Global per-participant message rate limiting.
//!
//! A fixed window counter: every participant may send `max_messages` within
//! `window`, counted from their first send in that window. The counter is keyed
//! by participant id only, so it follows a user from one room to the next.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::participant::ParticipantId;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_messages: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: 30,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    window_start: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    counters: DashMap<ParticipantId, Counter>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            counters: DashMap::new(),
            config,
        }
    }

    /// Counts one send attempt for `id`. Returns `false` when over the cap.
    pub fn check_and_increment(&self, id: ParticipantId) -> bool {
        self.check_and_increment_at(id, Instant::now())
    }

    pub fn check_and_increment_at(&self, id: ParticipantId, now: Instant) -> bool {
        let mut counter = self.counters.entry(id).or_insert(Counter {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(counter.window_start) >= self.config.window {
            counter.count = 0;
            counter.window_start = now;
        }

        // denied attempts are not counted
        if counter.count >= self.config.max_messages {
            debug!(participant = %id, count = counter.count, "message rate limit exceeded");
            return false;
        }

        counter.count += 1;
        true
    }

    /// Messages counted so far in the current window.
    pub fn count(&self, id: ParticipantId) -> u32 {
        self.counters.get(&id).map(|c| c.count).unwrap_or(0)
    }

    pub fn forget(&self, id: ParticipantId) {
        self.counters.remove(&id);
    }

    /// Drops counters whose window ended before `now`.
    pub fn purge_expired(&self, now: Instant) {
        let window = self.config.window;
        self.counters
            .retain(|_, c| now.saturating_duration_since(c.window_start) < window);
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
