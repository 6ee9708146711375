//! PostgreSQL implementation of PaymentRepository.
//!
//! Status changes are single `UPDATE ... WHERE status = ANY(predecessors)`
//! statements, so the database arbitrates concurrent writers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, PartnerId, PaymentId, StateMachine, Timestamp, UserId,
};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::ports::{CreateOutcome, PaymentRepository};

use super::{db_error, parse_column};

const PAYMENT_COLUMNS: &str = r#"
    id, payment_ref, partner_id, partner_tx_ref, provider, payment_type,
    amount, currency, user_id, phone_number, account_number, status,
    provider_reference, metadata, callback_received, callback_payload,
    callback_received_at, partner_notified, notification_attempts,
    last_notified_at, error_message, retry_count, created_at, updated_at
"#;

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn select_where(filter: &str) -> String {
    format!("SELECT {} FROM payments WHERE {}", PAYMENT_COLUMNS, filter)
}

/// Database row representation of a payment.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    payment_ref: String,
    partner_id: String,
    partner_tx_ref: String,
    provider: String,
    payment_type: String,
    amount: Decimal,
    currency: String,
    user_id: String,
    phone_number: Option<String>,
    account_number: Option<String>,
    status: String,
    provider_reference: Option<String>,
    metadata: Value,
    callback_received: bool,
    callback_payload: Option<Value>,
    callback_received_at: Option<DateTime<Utc>>,
    partner_notified: bool,
    notification_attempts: i32,
    last_notified_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            payment_ref: row.payment_ref,
            partner_id: PartnerId::new(row.partner_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid partner_id: {}", e))
            })?,
            partner_tx_ref: row.partner_tx_ref,
            provider: parse_column(&row.provider)?,
            payment_type: parse_column(&row.payment_type)?,
            amount: row.amount,
            currency: row.currency,
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            phone_number: row.phone_number,
            account_number: row.account_number,
            status: parse_column(&row.status)?,
            provider_reference: row.provider_reference,
            metadata: row.metadata,
            callback_received: row.callback_received,
            callback_payload: row.callback_payload,
            callback_received_at: row.callback_received_at.map(Timestamp::from_datetime),
            partner_notified: row.partner_notified,
            notification_attempts: row.notification_attempts,
            last_notified_at: row.last_notified_at.map(Timestamp::from_datetime),
            error_message: row.error_message,
            retry_count: row.retry_count,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn predecessors(to: PaymentStatus) -> Vec<String> {
    PaymentStatus::predecessors_of(to, &PaymentStatus::ALL)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn create(&self, payment: &Payment) -> Result<CreateOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                id, payment_ref, partner_id, partner_tx_ref, provider, payment_type,
                amount, currency, user_id, phone_number, account_number, status,
                provider_reference, metadata, callback_received, callback_payload,
                callback_received_at, partner_notified, notification_attempts,
                last_notified_at, error_message, retry_count, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(&payment.payment_ref)
        .bind(payment.partner_id.as_str())
        .bind(&payment.partner_tx_ref)
        .bind(payment.provider.as_str())
        .bind(payment.payment_type.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.user_id.as_str())
        .bind(&payment.phone_number)
        .bind(&payment.account_number)
        .bind(payment.status.as_str())
        .bind(&payment.provider_reference)
        .bind(&payment.metadata)
        .bind(payment.callback_received)
        .bind(&payment.callback_payload)
        .bind(payment.callback_received_at.map(|t| *t.as_datetime()))
        .bind(payment.partner_notified)
        .bind(payment.notification_attempts)
        .bind(payment.last_notified_at.map(|t| *t.as_datetime()))
        .bind(&payment.error_message)
        .bind(payment.retry_count)
        .bind(payment.created_at.as_datetime())
        .bind(payment.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert payment"))?;

        if result.rows_affected() == 1 {
            return Ok(CreateOutcome::Created);
        }

        match self.find_by_ref(&payment.payment_ref).await? {
            Some(existing) => Ok(CreateOutcome::Existing(Box::new(existing))),
            None => Err(DomainError::new(
                ErrorCode::Conflict,
                format!(
                    "payment {} conflicts with an existing row",
                    payment.payment_ref
                ),
            )),
        }
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let sql = select_where("id = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment"))?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_by_ref(&self, payment_ref: &str) -> Result<Option<Payment>, DomainError> {
        let sql = select_where("payment_ref = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment by ref"))?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_by_partner_ref(
        &self,
        partner_id: &PartnerId,
        partner_tx_ref: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let sql = select_where("partner_id = $1 AND partner_tx_ref = $2");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(partner_id.as_str())
            .bind(partner_tx_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to load payment by partner ref"))?;
        row.map(Payment::try_from).transpose()
    }

    async fn transition_status(
        &self,
        id: &PaymentId,
        to: PaymentStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = $2, updated_at = $3
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(predecessors(to))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update payment status"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError> {
        let failed: Option<bool> = sqlx::query_scalar(
            r#"
            WITH prev AS (
                SELECT status FROM payments WHERE id = $1 FOR UPDATE
            )
            UPDATE payments p SET
                error_message = $2,
                retry_count = p.retry_count + 1,
                status = CASE WHEN prev.status = ANY($4) THEN $5 ELSE p.status END,
                updated_at = $3
            FROM prev
            WHERE p.id = $1
            RETURNING prev.status = ANY($4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(message)
        .bind(Utc::now())
        .bind(predecessors(PaymentStatus::Failed))
        .bind(PaymentStatus::Failed.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to record payment error"))?;

        failed.ok_or_else(|| {
            DomainError::new(ErrorCode::PaymentNotFound, format!("payment {} not found", id))
        })
    }

    async fn fail_with_error(&self, id: &PaymentId, message: &str) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                error_message = $3,
                retry_count = retry_count + 1,
                updated_at = $4
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(PaymentStatus::Failed.as_str())
        .bind(message)
        .bind(Utc::now())
        .bind(predecessors(PaymentStatus::Failed))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to fail payment"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_callback(
        &self,
        id: &PaymentId,
        payload: &Value,
        provider_reference: Option<&str>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE payments SET
                callback_received = TRUE,
                callback_payload = $2,
                callback_received_at = $3,
                provider_reference = COALESCE(provider_reference, $4),
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(payload)
        .bind(Utc::now())
        .bind(provider_reference)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record callback"))?;

        Ok(())
    }

    async fn mark_partner_notified(&self, id: &PaymentId) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE payments SET
                partner_notified = TRUE,
                notification_attempts = notification_attempts + 1,
                last_notified_at = $2,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to mark partner notified"))?;

        Ok(())
    }

    async fn find_unsettled(&self, limit: u32) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments p
            WHERE p.status = 'completed'
              AND NOT EXISTS (SELECT 1 FROM settlements s WHERE s.payment_id = p.id)
            ORDER BY p.updated_at
            LIMIT $1
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list unsettled payments"))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn find_unnotified(
        &self,
        updated_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE status = ANY($1) AND NOT partner_notified AND updated_at < $2
            ORDER BY updated_at
            LIMIT $3
            "#,
            PAYMENT_COLUMNS
        );
        let terminal: Vec<String> = PaymentStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.as_str().to_string())
            .collect();
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(terminal)
            .bind(updated_before.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list unnotified payments"))?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn find_stale_pending(
        &self,
        created_before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM payments
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(created_before.as_datetime())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list stale payments"))?;

        rows.into_iter().map(Payment::try_from).collect()
    }
}
