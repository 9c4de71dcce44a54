//! RPC client configuration.

use std::time::Duration;

/// Call timeout used when a request does not specify one.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcClientConfig {
    /// Timeout for calls that do not set their own.
    pub default_timeout: Duration,
    /// Backoff used by the reply consumer when its stream fails.
    pub reply_backoff: BackoffConfig,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_RPC_TIMEOUT,
            reply_backoff: BackoffConfig::default(),
        }
    }
}

impl RpcClientConfig {
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

/// Exponential backoff: `initial * factor^attempt`, capped at `max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2,
        }
    }
}

impl BackoffConfig {
    /// Delay before reconnect attempt `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = self.factor.max(1).saturating_pow(attempt);
        self.initial.saturating_mul(multiplier).min(self.max)
    }
}
