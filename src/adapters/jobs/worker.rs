//! OutboxWorker - Background service draining the job outbox.
//!
//! Every third-party call (provider dispatch, ledger settlement, partner
//! notification) runs here, never on the HTTP request path:
//! 1. Handlers write jobs to the outbox
//! 2. **OutboxWorker claims due jobs and runs them** ← This module
//!
//! ## Retry Policy
//!
//! | Outcome | Attempts left | Result |
//! |---------|---------------|--------|
//! | `Ok` | - | `completed` |
//! | retryable `JobError` | yes | `pending`, due after `base * 2^(attempts-1)` |
//! | retryable `JobError` | no | `failed` |
//! | permanent `JobError` | - | `failed` |
//!
//! ## Graceful Shutdown
//!
//! The worker listens for a shutdown signal and finishes the current batch
//! before stopping.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time;

use crate::config::WorkerConfig;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{JobHandler, JobOutbox, OutboxEntry};

/// Longest delay between two attempts of the same job.
const MAX_BACKOFF_SECS: u64 = 3600;

/// Delay before the next attempt, given the attempts made so far.
pub fn backoff_delay_secs(base_secs: u64, attempts: u32) -> u64 {
    let exponent = attempts.saturating_sub(1).min(16);
    base_secs
        .saturating_mul(1u64 << exponent)
        .min(MAX_BACKOFF_SECS)
}

/// Bounded worker pool over the job outbox.
pub struct OutboxWorker {
    outbox: Arc<dyn JobOutbox>,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
}

impl OutboxWorker {
    pub fn new(
        outbox: Arc<dyn JobOutbox>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            outbox,
            handler,
            config,
        }
    }

    /// Run the worker loop until shutdown signal is received.
    ///
    /// A failed poll is logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval());
        tracing::info!(
            handler = self.handler.name(),
            concurrency = self.config.concurrency,
            "Outbox worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.poll_logged().await;
                        tracing::info!("Outbox worker stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.poll_logged().await;
                }
            }
        }
    }

    async fn poll_logged(&self) {
        if let Err(e) = self.process_batch().await {
            tracing::error!(error = %e, "Failed to claim outbox jobs");
        }
    }

    /// Claim one batch of due jobs and run them concurrently.
    ///
    /// Returns the number of jobs claimed.
    pub async fn process_batch(&self) -> Result<usize, DomainError> {
        let lease_expired_before = Timestamp::now().minus_secs(self.config.lease_secs as i64);
        let entries = self
            .outbox
            .claim_due(self.config.batch_size, lease_expired_before)
            .await?;
        let claimed = entries.len();

        futures::stream::iter(entries)
            .for_each_concurrent(self.config.concurrency.max(1), |entry| async move {
                self.execute(entry).await;
            })
            .await;

        Ok(claimed)
    }

    /// Run exactly one poll cycle (for testing).
    pub async fn poll_once(&self) -> Result<usize, DomainError> {
        self.process_batch().await
    }

    async fn execute(&self, entry: OutboxEntry) {
        let result = self.handler.handle(&entry.job).await;

        let recorded = match result {
            Ok(()) => {
                tracing::debug!(job_id = %entry.id, job = %entry.job, "Job completed");
                self.outbox.mark_completed(entry.id).await
            }
            Err(e) if e.retryable && !entry.attempts_exhausted() => {
                let delay = backoff_delay_secs(self.config.backoff_base_secs, entry.attempts);
                tracing::warn!(
                    job_id = %entry.id,
                    job = %entry.job,
                    attempt = entry.attempts,
                    max_attempts = entry.max_attempts,
                    retry_in_secs = delay,
                    error = %e,
                    "Job failed, scheduling retry"
                );
                let next = Timestamp::now().plus_secs(delay as i64);
                self.outbox.mark_retry(entry.id, &e.message, next).await
            }
            Err(e) => {
                tracing::error!(
                    job_id = %entry.id,
                    job = %entry.job,
                    attempt = entry.attempts,
                    error = %e,
                    "Job failed permanently"
                );
                self.outbox.mark_failed(entry.id, &e.message).await
            }
        };

        if let Err(e) = recorded {
            tracing::error!(job_id = %entry.id, error = %e, "Failed to record job outcome");
        }
    }
}
