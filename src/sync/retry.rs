use crate::config::SyncConfig;
use std::time::Duration;

/// Delays never grow past this, however many attempts are configured.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Bounded exponential backoff shared by the fetcher's rate-limit path and
/// the loader's chunk retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Delay before retrying after the given failed attempt (1-based):
    /// base, 2×base, 4×base, ... capped at `MAX_DELAY`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    pub async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(self.delay_for(attempt)).await;
    }
}
