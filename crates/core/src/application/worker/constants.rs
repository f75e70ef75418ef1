// Worker constants (no magic values)
use std::time::Duration;

/// Time between polling cycles (10s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Pending deliveries fetched per workspace per cycle
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Outbound request timeout for deliveries and test webhooks (30s)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded wait for the worker to stop after a shutdown signal (5s)
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Response bodies stored on delivery records are capped at 4 KiB
pub const MAX_STORED_BODY_BYTES: usize = 4096;

/// Response bodies returned by the test-delivery path are capped at 1 KiB
pub const MAX_TEST_BODY_BYTES: usize = 1024;
