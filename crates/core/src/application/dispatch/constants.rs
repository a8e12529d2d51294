// Dispatch constants (no magic values)
use std::time::Duration;

/// Default polling tick (60s)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Default notification claim lease (60s)
/// Must exceed the transport timeout so a slow send cannot be duplicated
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(60);

/// Grace period for an in-flight cycle on shutdown (5s)
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts at flagging an entry after a confirmed send
pub const MARK_ATTEMPTS: u32 = 3;

/// Delay before the second attempt; doubles each retry
pub const MARK_RETRY_BACKOFF: Duration = Duration::from_millis(50);
