//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentRepository` - Payment aggregate with CAS status updates
//! - `PostgresProviderTransactionRepository` - Provider attempts, correlation lookup
//! - `PostgresSettlementRepository` - At-most-once settlement claims
//! - `PostgresJobOutbox` - Durable job queue claimed with `SKIP LOCKED`
//!
//! Schema lives in `migrations/`.

mod job_outbox;
mod payment_repository;
mod provider_transaction_repository;
mod settlement_repository;

pub use job_outbox::PostgresJobOutbox;
pub use payment_repository::PostgresPaymentRepository;
pub use provider_transaction_repository::PostgresProviderTransactionRepository;
pub use settlement_repository::PostgresSettlementRepository;

use std::str::FromStr;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Map a sqlx error into a `DatabaseError` with the given context.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

/// Parse a stored enum column, treating bad values as database corruption.
fn parse_column<T>(value: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = ValidationError>,
{
    value.parse::<T>().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid stored value '{}': {}", value, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentStatus;

    #[test]
    fn parse_column_reads_known_values() {
        let status: PaymentStatus = parse_column("completed").unwrap();
        assert_eq!(status, PaymentStatus::Completed);
    }

    #[test]
    fn parse_column_reports_database_error() {
        let err = parse_column::<PaymentStatus>("settled?").unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
