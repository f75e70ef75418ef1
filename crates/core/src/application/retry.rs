// Retry policy for failed webhook deliveries
use crate::domain::WebhookDelivery;
use crate::error::{AppError, Result};
use crate::port::TimeProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Backoff schedule indexed by the pre-increment attempt count:
/// 30s, 1m, 2m, 5m, 15m, 1h, 6h, then a 24h plateau.
pub const DEFAULT_BACKOFF_SCHEDULE: [Duration; 8] = [
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(2 * 60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(6 * 60 * 60),
    Duration::from_secs(24 * 60 * 60),
];

/// Delay before the next attempt using the default schedule
pub fn backoff(attempts: i32) -> Duration {
    lookup(&DEFAULT_BACKOFF_SCHEDULE, attempts)
}

fn lookup(schedule: &[Duration], attempts: i32) -> Duration {
    let idx = (attempts.max(0) as usize).min(schedule.len() - 1);
    schedule[idx]
}

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reschedule with the incremented attempt count
    Retry {
        attempts: i32,
        next_attempt_at: i64,
        delay: Duration,
    },
    /// Max attempts reached, fail permanently
    Exhausted { attempts: i32 },
}

/// Retry policy
///
/// Determines whether a failed delivery is rescheduled or permanently failed,
/// based on:
/// - Attempts already made (before this failure)
/// - Maximum attempts allowed on the delivery
/// - The backoff schedule
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    schedule: Vec<Duration>,
}

impl RetryPolicy {
    /// Create a retry policy with the default schedule
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            schedule: DEFAULT_BACKOFF_SCHEDULE.to_vec(),
        }
    }

    /// Create a retry policy with a custom schedule
    ///
    /// The schedule must be non-empty and non-decreasing.
    pub fn with_schedule(
        time_provider: Arc<dyn TimeProvider>,
        schedule: Vec<Duration>,
    ) -> Result<Self> {
        if schedule.is_empty() {
            return Err(AppError::Config("backoff schedule is empty".to_string()));
        }
        if schedule.windows(2).any(|w| w[1] < w[0]) {
            return Err(AppError::Config(
                "backoff schedule must be non-decreasing".to_string(),
            ));
        }
        Ok(Self {
            time_provider,
            schedule,
        })
    }

    /// Delay for a given pre-increment attempt count, clamped to the last entry
    pub fn backoff(&self, attempts: i32) -> Duration {
        lookup(&self.schedule, attempts)
    }

    /// Decide what to do with a delivery whose current attempt just failed
    ///
    /// Returns:
    /// - `RetryDecision::Exhausted` once `attempts + 1 >= max_attempts`
    /// - `RetryDecision::Retry` otherwise, eligible at `now + backoff(attempts)`
    pub fn decide(&self, delivery: &WebhookDelivery) -> RetryDecision {
        let attempts = delivery.attempts.saturating_add(1);

        if attempts >= delivery.max_attempts {
            warn!(
                delivery_id = %delivery.id,
                attempts = %attempts,
                max_attempts = %delivery.max_attempts,
                "Max delivery attempts reached"
            );
            return RetryDecision::Exhausted { attempts };
        }

        let delay = self.backoff(delivery.attempts);
        let next_attempt_at = self.time_provider.now_millis() + delay.as_millis() as i64;

        info!(
            delivery_id = %delivery.id,
            attempts = %attempts,
            max_attempts = %delivery.max_attempts,
            delay_secs = %delay.as_secs(),
            "Scheduling delivery retry"
        );

        RetryDecision::Retry {
            attempts,
            next_attempt_at,
            delay,
        }
    }
}
