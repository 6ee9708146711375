//! Background worker configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Job outbox worker pool and recovery sweep settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Jobs executed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Jobs claimed per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Attempts for partner notification jobs.
    #[serde(default = "default_notification_max_attempts")]
    pub notification_max_attempts: u32,

    /// First retry delay; doubles per attempt.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// An in-flight job older than this is considered abandoned.
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Pending payments older than this without a dispatch are re-enqueued;
    /// final payments idle this long without a notify job get one.
    #[serde(default = "default_stale_pending_secs")]
    pub stale_pending_secs: u64,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 || self.concurrency > 256 {
            return Err(ValidationError::InvalidConcurrency);
        }
        if self.batch_size == 0 || self.sweep_batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.notification_max_attempts == 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.poll_interval_ms == 0 || self.lease_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            notification_max_attempts: default_notification_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            lease_secs: default_lease_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stale_pending_secs: default_stale_pending_secs(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

fn default_batch_size() -> u32 {
    32
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_notification_max_attempts() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    5
}

fn default_lease_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_stale_pending_secs() -> u64 {
    120
}

fn default_sweep_batch_size() -> u32 {
    100
}
