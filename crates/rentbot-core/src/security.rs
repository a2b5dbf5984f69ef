use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Owner checks ==============

pub fn is_owner(user_id: UserId, owner_id: UserId) -> bool {
    user_id == owner_id
}

// ============== Rate Limiter (Token Bucket) ==============

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

/// Bucket count that triggers a sweep of idle users.
const SWEEP_AT: usize = 1024;

/// Per-user token bucket guarding completion calls (they cost money).
///
/// A bucket idle for a whole window is full again and indistinguishable from a
/// fresh one, so such buckets are dropped once the map grows past [`SWEEP_AT`].
#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_tokens: f64,
    refill_per_sec: f64,
    window: Duration,
    buckets: HashMap<UserId, Bucket>,
    next_sweep_at: usize,
}

impl RateLimiter {
    pub fn new(enabled: bool, max_tokens: u32, window: Duration) -> Self {
        let max_tokens_f = max_tokens as f64;
        let window_secs = window.as_secs_f64().max(1e-9);

        Self {
            enabled,
            max_tokens: max_tokens_f,
            refill_per_sec: max_tokens_f / window_secs,
            window,
            buckets: HashMap::new(),
            next_sweep_at: SWEEP_AT,
        }
    }

    pub fn check(&mut self, user_id: UserId) -> (bool, Option<Duration>) {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> (bool, Option<Duration>) {
        if !self.enabled {
            return (true, None);
        }

        if self.buckets.len() >= self.next_sweep_at {
            self.sweep(now);
        }

        let bucket = self.buckets.entry(user_id).or_insert_with(|| Bucket {
            tokens: self.max_tokens,
            last_update: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return (true, None);
        }

        let secs = (1.0 - bucket.tokens) / self.refill_per_sec;
        let wait = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX);
        (false, Some(wait))
    }

    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_update) < window);
        self.next_sweep_at = (self.buckets.len() * 2).max(SWEEP_AT);
    }
}
