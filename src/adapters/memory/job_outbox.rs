//! In-memory job outbox.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::payment::PaymentJob;
use crate::ports::{JobOutbox, JobStatus, OutboxEntry};

/// Job outbox kept in process memory; lost on restart.
#[derive(Default)]
pub struct InMemoryJobOutbox {
    entries: RwLock<HashMap<Uuid, OutboxEntry>>,
}

impl InMemoryJobOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub async fn entries(&self) -> Vec<OutboxEntry> {
        let mut entries: Vec<OutboxEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    pub async fn jobs_with_status(&self, status: JobStatus) -> Vec<PaymentJob> {
        self.entries()
            .await
            .into_iter()
            .filter(|e| e.status == status)
            .map(|e| e.job)
            .collect()
    }

    /// Make every pending entry due now (skips backoff in tests).
    pub async fn make_all_due(&self) {
        let now = Timestamp::now();
        for entry in self.entries.write().await.values_mut() {
            if entry.status == JobStatus::Pending {
                entry.next_attempt_at = now;
            }
        }
    }

    async fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut OutboxEntry),
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id).ok_or_else(|| {
            DomainError::new(ErrorCode::NotFound, format!("outbox entry {} not found", id))
        })?;
        apply(entry);
        Ok(())
    }
}

#[async_trait]
impl JobOutbox for InMemoryJobOutbox {
    async fn enqueue(
        &self,
        job: PaymentJob,
        max_attempts: u32,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = OutboxEntry::new(job, max_attempts);
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn claim_due(
        &self,
        limit: u32,
        lease_expired_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let now = Timestamp::now();
        let mut entries = self.entries.write().await;

        let mut due: Vec<&mut OutboxEntry> = entries
            .values_mut()
            .filter(|e| match e.status {
                JobStatus::Pending => !now.is_before(&e.next_attempt_at),
                JobStatus::InFlight => e.updated_at.is_before(&lease_expired_before),
                JobStatus::Completed | JobStatus::Failed => false,
            })
            .collect();
        due.sort_by_key(|e| e.next_attempt_at);

        Ok(due
            .into_iter()
            .take(limit as usize)
            .map(|entry| {
                entry.mark_claimed();
                entry.clone()
            })
            .collect())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), DomainError> {
        self.update(id, OutboxEntry::mark_completed).await
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), DomainError> {
        self.update(id, |entry| entry.mark_retry(error, next_attempt_at))
            .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        self.update(id, |entry| entry.mark_failed(error)).await
    }

    async fn has_open(&self, job: &PaymentJob) -> Result<bool, DomainError> {
        Ok(self.entries.read().await.values().any(|e| {
            &e.job == job && matches!(e.status, JobStatus::Pending | JobStatus::InFlight)
        }))
    }

    async fn has_entry(&self, job: &PaymentJob) -> Result<bool, DomainError> {
        Ok(self.entries.read().await.values().any(|e| &e.job == job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PaymentId;

    fn settle() -> PaymentJob {
        PaymentJob::Settle {
            payment_id: PaymentId::new(),
        }
    }

    fn long_lease() -> Timestamp {
        Timestamp::now().minus_secs(300)
    }

    #[tokio::test]
    async fn claimed_entry_is_not_claimed_twice() {
        let outbox = InMemoryJobOutbox::new();
        outbox.enqueue(settle(), 1).await.unwrap();

        let first = outbox.claim_due(10, long_lease()).await.unwrap();
        let second = outbox.claim_due(10, long_lease()).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].attempts, 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn abandoned_in_flight_entry_is_reclaimed_after_lease() {
        let outbox = InMemoryJobOutbox::new();
        outbox.enqueue(settle(), 3).await.unwrap();
        outbox.claim_due(10, long_lease()).await.unwrap();

        let reclaimed = outbox
            .claim_due(10, Timestamp::now().plus_secs(1))
            .await
            .unwrap();

        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].attempts, 2);
    }

    #[tokio::test]
    async fn retry_in_future_is_not_due() {
        let outbox = InMemoryJobOutbox::new();
        let entry = outbox.enqueue(settle(), 3).await.unwrap();
        outbox.claim_due(10, long_lease()).await.unwrap();

        outbox
            .mark_retry(entry.id, "503", Timestamp::now().plus_secs(60))
            .await
            .unwrap();
        assert!(outbox.claim_due(10, long_lease()).await.unwrap().is_empty());

        outbox.make_all_due().await;
        assert_eq!(outbox.claim_due(10, long_lease()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn has_open_ignores_finished_entries() {
        let outbox = InMemoryJobOutbox::new();
        let job = settle();
        let entry = outbox.enqueue(job, 1).await.unwrap();
        assert!(outbox.has_open(&job).await.unwrap());

        outbox.mark_completed(entry.id).await.unwrap();
        assert!(!outbox.has_open(&job).await.unwrap());
    }

    #[tokio::test]
    async fn has_entry_counts_failed_entries() {
        let outbox = InMemoryJobOutbox::new();
        let job = settle();
        assert!(!outbox.has_entry(&job).await.unwrap());

        let entry = outbox.enqueue(job, 1).await.unwrap();
        outbox.mark_failed(entry.id, "ledger down").await.unwrap();

        assert!(!outbox.has_open(&job).await.unwrap());
        assert!(outbox.has_entry(&job).await.unwrap());
    }
}
