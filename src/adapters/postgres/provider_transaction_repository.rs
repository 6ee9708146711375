//! PostgreSQL implementation of ProviderTransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, PaymentId, ProviderTransactionId, StateMachine, Timestamp};
use crate::domain::payment::{ProviderTransaction, ProviderTransactionStatus};
use crate::ports::ProviderTransactionRepository;

use super::{db_error, parse_column};

const TRANSACTION_COLUMNS: &str = r#"
    id, payment_id, provider, transaction_type, request_payload, response_payload,
    provider_tx_id, checkout_request_id, originator_conversation_id, status, result_code,
    result_description, created_at, updated_at
"#;

pub struct PostgresProviderTransactionRepository {
    pool: PgPool,
}

impl PostgresProviderTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProviderTransactionRow {
    id: Uuid,
    payment_id: Uuid,
    provider: String,
    transaction_type: String,
    request_payload: Value,
    response_payload: Option<Value>,
    provider_tx_id: Option<String>,
    checkout_request_id: Option<String>,
    originator_conversation_id: Option<String>,
    status: String,
    result_code: Option<String>,
    result_description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderTransactionRow> for ProviderTransaction {
    type Error = DomainError;

    fn try_from(row: ProviderTransactionRow) -> Result<Self, Self::Error> {
        Ok(ProviderTransaction {
            id: ProviderTransactionId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            provider: parse_column(&row.provider)?,
            transaction_type: parse_column(&row.transaction_type)?,
            request_payload: row.request_payload,
            response_payload: row.response_payload,
            provider_tx_id: row.provider_tx_id,
            checkout_request_id: row.checkout_request_id,
            originator_conversation_id: row.originator_conversation_id,
            status: parse_column(&row.status)?,
            result_code: row.result_code,
            result_description: row.result_description,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl ProviderTransactionRepository for PostgresProviderTransactionRepository {
    async fn insert(&self, transaction: &ProviderTransaction) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO provider_transactions (
                id, payment_id, provider, transaction_type, request_payload, response_payload,
                provider_tx_id, checkout_request_id, originator_conversation_id, status,
                result_code, result_description, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.payment_id.as_uuid())
        .bind(transaction.provider.as_str())
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.request_payload)
        .bind(&transaction.response_payload)
        .bind(&transaction.provider_tx_id)
        .bind(&transaction.checkout_request_id)
        .bind(&transaction.originator_conversation_id)
        .bind(transaction.status.as_str())
        .bind(&transaction.result_code)
        .bind(&transaction.result_description)
        .bind(transaction.created_at.as_datetime())
        .bind(transaction.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to insert provider transaction"))?;

        Ok(())
    }

    async fn find_by_correlation_key(
        &self,
        key: &str,
    ) -> Result<Option<ProviderTransaction>, DomainError> {
        let sql = format!(
            r#"
            SELECT {} FROM provider_transactions
            WHERE checkout_request_id = $1
               OR provider_tx_id = $1
               OR originator_conversation_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, ProviderTransactionRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to look up provider transaction"))?;

        row.map(ProviderTransaction::try_from).transpose()
    }

    async fn find_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<ProviderTransaction>, DomainError> {
        let sql = format!(
            "SELECT {} FROM provider_transactions WHERE payment_id = $1 ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProviderTransactionRow>(&sql)
            .bind(payment_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list provider transactions"))?;

        rows.into_iter().map(ProviderTransaction::try_from).collect()
    }

    async fn transition_status(
        &self,
        id: &ProviderTransactionId,
        to: ProviderTransactionStatus,
        result_code: &str,
        result_description: &str,
    ) -> Result<bool, DomainError> {
        let from: Vec<String> =
            ProviderTransactionStatus::predecessors_of(to, &ProviderTransactionStatus::ALL)
                .into_iter()
                .map(|s| s.as_str().to_string())
                .collect();

        let result = sqlx::query(
            r#"
            UPDATE provider_transactions SET
                status = $2, result_code = $3, result_description = $4, updated_at = $5
            WHERE id = $1 AND status = ANY($6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(to.as_str())
        .bind(result_code)
        .bind(result_description)
        .bind(Utc::now())
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update provider transaction"))?;

        Ok(result.rows_affected() == 1)
    }
}
