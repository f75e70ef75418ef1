// Keyed token-bucket rate limiter
//
// State lives in the instance, not in a process-wide map, so each worker or
// test owns and can reset its own buckets.

use crate::port::{RateLimiter, TimeProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Minimum spacing between sweeps of refilled buckets
const SWEEP_INTERVAL_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill_ms: i64,
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    last_sweep_ms: i64,
}

/// Token bucket per key: `burst` capacity, refilled at `refill_per_sec`.
///
/// A bucket that has refilled to capacity is indistinguishable from an
/// unseen key, so such entries are dropped on a periodic sweep. Memory is
/// bounded by the keys active within one refill window. With a zero refill
/// rate, drained buckets are kept until `reset`.
pub struct KeyedRateLimiter {
    burst: u32,
    refill_per_sec: f64,
    time_provider: Arc<dyn TimeProvider>,
    state: Mutex<State>,
}

impl KeyedRateLimiter {
    pub fn new(burst: u32, refill_per_sec: f64, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            burst,
            refill_per_sec,
            time_provider,
            state: Mutex::new(State::default()),
        }
    }

    /// Tokens currently available for `key` (full bucket if never seen)
    pub fn available(&self, key: &str) -> u32 {
        let now = self.time_provider.now_millis();
        match self.state().buckets.get(key) {
            Some(bucket) => self.refilled(*bucket, now).tokens.floor() as u32,
            None => self.burst,
        }
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.state().buckets.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refilled(&self, bucket: Bucket, now: i64) -> Bucket {
        let elapsed_secs = (now - bucket.last_refill_ms).max(0) as f64 / 1000.0;
        Bucket {
            tokens: (bucket.tokens + elapsed_secs * self.refill_per_sec).min(self.burst as f64),
            last_refill_ms: now,
        }
    }

    fn sweep(&self, state: &mut State, now: i64) {
        if now - state.last_sweep_ms < SWEEP_INTERVAL_MS {
            return;
        }
        let burst = self.burst as f64;
        state
            .buckets
            .retain(|_, bucket| self.refilled(*bucket, now).tokens < burst);
        state.last_sweep_ms = now;
    }
}

impl RateLimiter for KeyedRateLimiter {
    fn try_acquire(&self, key: &str) -> bool {
        let now = self.time_provider.now_millis();
        let mut state = self.state();
        self.sweep(&mut state, now);

        let current = state.buckets.get(key).copied().unwrap_or(Bucket {
            tokens: self.burst as f64,
            last_refill_ms: now,
        });
        let mut bucket = self.refilled(current, now);

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }
        state.buckets.insert(key.to_string(), bucket);
        allowed
    }

    fn reset(&self, key: &str) {
        self.state().buckets.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mocks::FixedTimeProvider;

    fn limiter(burst: u32, per_sec: f64) -> (KeyedRateLimiter, Arc<FixedTimeProvider>) {
        let clock = Arc::new(FixedTimeProvider::new(0));
        (KeyedRateLimiter::new(burst, per_sec, clock.clone()), clock)
    }

    #[test]
    fn test_burst_then_throttle() {
        let (limiter, _clock) = limiter(3, 1.0);
        assert!(limiter.try_acquire("sub-1"));
        assert!(limiter.try_acquire("sub-1"));
        assert!(limiter.try_acquire("sub-1"));
        assert!(!limiter.try_acquire("sub-1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1, 1.0);
        assert!(limiter.try_acquire("sub-1"));
        assert!(!limiter.try_acquire("sub-1"));
        assert!(limiter.try_acquire("sub-2"));
    }

    #[test]
    fn test_refill_over_time_caps_at_burst() {
        let (limiter, clock) = limiter(2, 2.0);
        assert!(limiter.try_acquire("k"));
        assert!(limiter.try_acquire("k"));
        assert!(!limiter.try_acquire("k"));

        clock.advance(500);
        assert_eq!(limiter.available("k"), 1);
        assert!(limiter.try_acquire("k"));

        clock.advance(60_000);
        assert_eq!(limiter.available("k"), 2);
    }

    #[test]
    fn test_reset_restores_full_bucket() {
        let (limiter, _clock) = limiter(1, 0.0);
        assert!(limiter.try_acquire("k"));
        assert!(!limiter.try_acquire("k"));
        limiter.reset("k");
        assert!(limiter.try_acquire("k"));
    }

    #[test]
    fn test_refilled_buckets_are_evicted() {
        let (limiter, clock) = limiter(2, 1.0);
        for i in 0..100 {
            assert!(limiter.try_acquire(&format!("sub-{}", i)));
        }
        assert_eq!(limiter.tracked_keys(), 100);

        clock.advance(SWEEP_INTERVAL_MS + 1);
        assert!(limiter.try_acquire("sub-new"));
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.available("sub-0"), 2);
    }

    #[test]
    fn test_sweep_keeps_buckets_still_refilling() {
        let (limiter, clock) = limiter(1, 0.0);
        assert!(limiter.try_acquire("drained"));
        assert!(!limiter.try_acquire("drained"));

        clock.advance(SWEEP_INTERVAL_MS * 2);
        assert!(limiter.try_acquire("other"));
        assert_eq!(limiter.tracked_keys(), 2);
        assert!(!limiter.try_acquire("drained"));
    }
}
