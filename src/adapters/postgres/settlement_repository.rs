//! PostgreSQL implementation of SettlementRepository.
//!
//! The `settlements_payment_kind_key` unique constraint is what makes a
//! claim exclusive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp};
use crate::domain::payment::{SettlementKind, SettlementRecord, SettlementStatus};
use crate::ports::{ClaimResult, SettlementRepository};

use super::{db_error, parse_column};

pub struct PostgresSettlementRepository {
    pool: PgPool,
}

impl PostgresSettlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SettlementRow {
    id: Uuid,
    payment_id: Uuid,
    kind: String,
    status: String,
    ledger_reference: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettlementRow> for SettlementRecord {
    type Error = DomainError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        Ok(SettlementRecord {
            id: row.id,
            payment_id: PaymentId::from_uuid(row.payment_id),
            kind: parse_column(&row.kind)?,
            status: parse_column(&row.status)?,
            ledger_reference: row.ledger_reference,
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SettlementRepository for PostgresSettlementRepository {
    async fn claim(&self, record: &SettlementRecord) -> Result<ClaimResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlements (
                id, payment_id, kind, status, ledger_reference, error_message,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT ON CONSTRAINT settlements_payment_kind_key DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.payment_id.as_uuid())
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(&record.ledger_reference)
        .bind(&record.error_message)
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to claim settlement"))?;

        if result.rows_affected() == 1 {
            return Ok(ClaimResult::Claimed);
        }

        let existing = self.find(&record.payment_id, record.kind).await?;
        Ok(ClaimResult::AlreadyClaimed(
            existing
                .map(|r| r.status)
                .unwrap_or(SettlementStatus::Claimed),
        ))
    }

    async fn mark_settled(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        ledger_reference: Option<&str>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE settlements SET status = $3, ledger_reference = $4, updated_at = $5
            WHERE payment_id = $1 AND kind = $2
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(kind.as_str())
        .bind(SettlementStatus::Settled.as_str())
        .bind(ledger_reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark settlement settled"))?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
        error: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE settlements SET status = $3, error_message = $4, updated_at = $5
            WHERE payment_id = $1 AND kind = $2
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(kind.as_str())
        .bind(SettlementStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark settlement failed"))?;

        Ok(())
    }

    async fn find(
        &self,
        payment_id: &PaymentId,
        kind: SettlementKind,
    ) -> Result<Option<SettlementRecord>, DomainError> {
        let row = sqlx::query_as::<_, SettlementRow>(
            r#"
            SELECT id, payment_id, kind, status, ledger_reference, error_message,
                   created_at, updated_at
            FROM settlements WHERE payment_id = $1 AND kind = $2
            "#,
        )
        .bind(payment_id.as_uuid())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load settlement"))?;

        row.map(SettlementRecord::try_from).transpose()
    }
}
