//! PaymentJobExecutor - Routes outbox jobs to their handlers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::payment::{PaymentError, PaymentJob};
use crate::ports::{JobError, JobHandler};

use super::{DispatchPaymentHandler, NotifyPartnerHandler, SettlePaymentHandler};

pub struct PaymentJobExecutor {
    dispatch: Arc<DispatchPaymentHandler>,
    settle: Arc<SettlePaymentHandler>,
    notify: Arc<NotifyPartnerHandler>,
}

impl PaymentJobExecutor {
    pub fn new(
        dispatch: Arc<DispatchPaymentHandler>,
        settle: Arc<SettlePaymentHandler>,
        notify: Arc<NotifyPartnerHandler>,
    ) -> Self {
        Self {
            dispatch,
            settle,
            notify,
        }
    }
}

fn job_error(err: PaymentError) -> JobError {
    if err.is_retryable() {
        JobError::retryable(err.to_string())
    } else {
        JobError::permanent(err.to_string())
    }
}

#[async_trait]
impl JobHandler for PaymentJobExecutor {
    async fn handle(&self, job: &PaymentJob) -> Result<(), JobError> {
        match *job {
            PaymentJob::Dispatch { payment_id } => {
                self.dispatch.handle(payment_id).await.map(|_| ())
            }
            PaymentJob::Settle { payment_id } => self.settle.handle(payment_id).await.map(|_| ()),
            PaymentJob::Notify { payment_id } => self.notify.handle(payment_id).await,
        }
        .map_err(job_error)
    }

    fn name(&self) -> &'static str {
        "payment_jobs"
    }
}
