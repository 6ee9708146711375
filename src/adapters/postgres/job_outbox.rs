//! PostgreSQL job outbox.
//!
//! Workers on several processes may poll the same table; `claim_due` locks
//! rows with `FOR UPDATE SKIP LOCKED` so each entry goes to one worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::payment::PaymentJob;
use crate::ports::{JobOutbox, JobStatus, OutboxEntry};

use super::{db_error, parse_column};

const ENTRY_COLUMNS: &str = r#"
    id, job, status, attempts, max_attempts, next_attempt_at, last_error,
    created_at, updated_at
"#;

pub struct PostgresJobOutbox {
    pool: PgPool,
}

impl PostgresJobOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    job: Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let job: PaymentJob = serde_json::from_value(row.job).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Invalid job payload for outbox entry {}: {}", row.id, e),
            )
        })?;

        Ok(OutboxEntry {
            id: row.id,
            job,
            status: parse_column(&row.status)?,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(1) as u32,
            next_attempt_at: Timestamp::from_datetime(row.next_attempt_at),
            last_error: row.last_error,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn job_payload(job: &PaymentJob) -> Result<Value, DomainError> {
    serde_json::to_value(job).map_err(|e| {
        DomainError::new(
            ErrorCode::SerializationError,
            format!("Failed to serialize job: {}", e),
        )
    })
}

impl PostgresJobOutbox {
    async fn set_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error: Option<&str>,
        next_attempt_at: Option<&DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_jobs SET
                status = $2,
                last_error = $3,
                next_attempt_at = COALESCE($4, next_attempt_at),
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .bind(next_attempt_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update outbox entry"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotFound,
                format!("outbox entry {} not found", id),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl JobOutbox for PostgresJobOutbox {
    async fn enqueue(
        &self,
        job: PaymentJob,
        max_attempts: u32,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = OutboxEntry::new(job, max_attempts);

        sqlx::query(
            r#"
            INSERT INTO payment_jobs (
                id, kind, payment_id, job, status, attempts, max_attempts,
                next_attempt_at, last_error, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(job.kind())
        .bind(job.payment_id().as_uuid())
        .bind(job_payload(&job)?)
        .bind(entry.status.as_str())
        .bind(entry.attempts as i32)
        .bind(entry.max_attempts as i32)
        .bind(entry.next_attempt_at.as_datetime())
        .bind(&entry.last_error)
        .bind(entry.created_at.as_datetime())
        .bind(entry.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to enqueue job"))?;

        Ok(entry)
    }

    async fn claim_due(
        &self,
        limit: u32,
        lease_expired_before: Timestamp,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let sql = format!(
            r#"
            UPDATE payment_jobs SET
                status = 'in_flight', attempts = attempts + 1, updated_at = $3
            WHERE id IN (
                SELECT id FROM payment_jobs
                WHERE (status = 'pending' AND next_attempt_at <= $3)
                   OR (status = 'in_flight' AND updated_at < $2)
                ORDER BY next_attempt_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        );

        let rows = sqlx::query_as::<_, OutboxRow>(&sql)
            .bind(i64::from(limit))
            .bind(lease_expired_before.as_datetime())
            .bind(Utc::now())
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error("Failed to claim jobs"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit job claim"))?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), DomainError> {
        self.set_status(id, JobStatus::Completed, None, None).await
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: Timestamp,
    ) -> Result<(), DomainError> {
        self.set_status(
            id,
            JobStatus::Pending,
            Some(error),
            Some(next_attempt_at.as_datetime()),
        )
        .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        self.set_status(id, JobStatus::Failed, Some(error), None)
            .await
    }

    async fn has_open(&self, job: &PaymentJob) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM payment_jobs
                WHERE payment_id = $1 AND kind = $2
                  AND status IN ('pending', 'in_flight')
            )
            "#,
        )
        .bind(job.payment_id().as_uuid())
        .bind(job.kind())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check open jobs"))
    }

    async fn has_entry(&self, job: &PaymentJob) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM payment_jobs WHERE payment_id = $1 AND kind = $2)",
        )
        .bind(job.payment_id().as_uuid())
        .bind(job.kind())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check job history"))
    }
}
