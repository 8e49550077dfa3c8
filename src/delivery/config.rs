//! Transport and retry settings carried by each task.

use std::time::Duration;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of attempts for queued deliveries, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
/// Default fixed delay between queued attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(120);
/// Default bounded channel capacity of the worker pool.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 1;

/// Per-attempt HTTP settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    /// Proxy URL, e.g. `http://proxy.local:3128`.
    pub proxy: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Skip TLS certificate and hostname verification.
    ///
    /// Only for endpoints whose certificate chain cannot be validated;
    /// anyone on the network path can then read and alter the traffic,
    /// bot token included.
    pub accept_invalid_certs: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// Fixed-delay retry policy applied by queue consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Wait between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}
