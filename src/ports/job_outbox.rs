//! JobOutbox port - durable queue of background payment jobs.
//!
//! Every call to a third party (provider dispatch, partner settlement,
//! partner notification) is written here first and executed later by the
//! worker pool, so an HTTP request never waits on, or cancels, an external
//! call.
//!
//! ## Entry Lifecycle
//!
//! ```text
//! pending ──claim──► in_flight ──ok──► completed
//!    ▲                   │
//!    └──── retry ────────┤
//!                        └──exhausted──► failed
//! ```
//!
//! An `in_flight` entry whose lease expired (worker crashed) is claimable
//! again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, ValidationError};
use crate::domain::payment::PaymentJob;

/// Status of an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for `next_attempt_at`.
    Pending,
    /// Claimed by a worker.
    InFlight,
    Completed,
    /// Attempts exhausted or non-retryable error.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InFlight => "in_flight",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_flight" => Ok(JobStatus::InFlight),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown job status '{}'", other),
            )),
        }
    }
}

/// An entry in the job outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub job: PaymentJob,
    pub status: JobStatus,

    /// Attempts started so far (incremented on claim).
    pub attempts: u32,

    pub max_attempts: u32,

    /// Earliest time the entry may be claimed.
    pub next_attempt_at: Timestamp,

    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OutboxEntry {
    /// Create a new pending entry, due immediately.
    pub fn new(job: PaymentJob, max_attempts: u32) -> Self {
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            job,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn mark_claimed(&mut self) {
        self.status = JobStatus::InFlight;
        self.attempts += 1;
        self.updated_at = Timestamp::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = JobStatus::Completed;
        self.last_error = None;
        self.updated_at = Timestamp::now();
    }

    pub fn mark_retry(&mut self, error: impl Into<String>, next_attempt_at: Timestamp) {
        self.status = JobStatus::Pending;
        self.last_error = Some(error.into());
        self.next_attempt_at = next_attempt_at;
        self.updated_at = Timestamp::now();
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = Timestamp::now();
    }
}

/// Port for the durable job queue.
#[async_trait]
pub trait JobOutbox: Send + Sync {
    /// Append a job, due immediately.
    async fn enqueue(&self, job: PaymentJob, max_attempts: u32)
        -> Result<OutboxEntry, DomainError>;

    /// Claim up to `limit` due entries, moving them to `in_flight` and
    /// counting the attempt.
    ///
    /// Entries left `in_flight` since before `lease_expired_before` are
    /// treated as abandoned and claimed again.
    async fn claim_due(
        &self,
        limit: u32,
        lease_expired_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError>;

    async fn mark_completed(&self, id: Uuid) -> Result<(), DomainError>;

    /// Put the entry back to `pending`, due at `next_attempt_at`.
    async fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), DomainError>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError>;

    /// Whether a pending or in-flight entry exists for this exact job.
    async fn has_open(&self, job: &PaymentJob) -> Result<bool, DomainError>;

    /// Whether any entry, finished or not, exists for this exact job.
    async fn has_entry(&self, job: &PaymentJob) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PaymentId;

    fn notify_entry(max_attempts: u32) -> OutboxEntry {
        OutboxEntry::new(
            PaymentJob::Notify {
                payment_id: PaymentId::new(),
            },
            max_attempts,
        )
    }

    #[test]
    fn claim_counts_attempt() {
        let mut entry = notify_entry(3);
        assert_eq!(entry.status, JobStatus::Pending);
        assert_eq!(entry.attempts, 0);

        entry.mark_claimed();

        assert_eq!(entry.status, JobStatus::InFlight);
        assert_eq!(entry.attempts, 1);
        assert!(!entry.attempts_exhausted());
    }

    #[test]
    fn retry_returns_entry_to_pending() {
        let mut entry = notify_entry(3);
        entry.mark_claimed();
        let later = Timestamp::now().plus_secs(30);

        entry.mark_retry("partner returned 503", later);

        assert_eq!(entry.status, JobStatus::Pending);
        assert_eq!(entry.next_attempt_at, later);
        assert_eq!(entry.last_error.as_deref(), Some("partner returned 503"));
    }

    #[test]
    fn single_attempt_job_is_exhausted_after_one_claim() {
        let mut entry = notify_entry(0);
        assert_eq!(entry.max_attempts, 1);
        entry.mark_claimed();
        assert!(entry.attempts_exhausted());
    }

    #[test]
    fn status_parses_from_column_value() {
        assert_eq!("in_flight".parse::<JobStatus>().unwrap(), JobStatus::InFlight);
        assert!("done".parse::<JobStatus>().is_err());
    }
}
