//! JobHandler port - executes one outbox job.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::payment::PaymentJob;

/// Failure of a single job attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct JobError {
    pub message: String,
    /// Whether the outbox should schedule another attempt.
    pub retryable: bool,
}

impl JobError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Handler invoked by the worker pool for each claimed job.
///
/// Implementations should be:
/// - **Idempotent** - a job may run more than once after a crash
/// - **Self-contained** - errors are reported, never panicked
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &PaymentJob) -> Result<(), JobError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_handler_object_safe(_: &dyn JobHandler) {}

    #[test]
    fn constructors_set_retry_flag() {
        assert!(JobError::retryable("503").retryable);
        assert!(!JobError::permanent("unknown partner").retryable);
    }
}
