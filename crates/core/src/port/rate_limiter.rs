// Rate Limiter Port
//
// Injected capability keyed by subscription (or RPC method), so tests can
// substitute or reset it instead of relying on process-wide state.

/// Keyed admission control
pub trait RateLimiter: Send + Sync {
    /// Try to consume one permit for `key`. Returns false when throttled.
    fn try_acquire(&self, key: &str) -> bool;

    /// Forget all state for `key`
    fn reset(&self, key: &str);
}
