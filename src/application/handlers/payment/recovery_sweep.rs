//! RecoverySweepHandler - Re-enqueues work a crash left behind.
//!
//! Three gaps can survive a restart or a failed enqueue:
//! - a completed payment whose settle job was lost (no settlement record)
//! - a terminal payment whose notify job was never enqueued
//! - a pending payment whose dispatch job was lost
//!
//! Settle and dispatch are only enqueued when none is already open for the
//! payment. Notify is only enqueued when the payment has no notify entry at
//! all, so a notification that used up its attempts stays given up.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{PaymentError, PaymentJob};
use crate::ports::{JobOutbox, PaymentRepository};

use super::{DISPATCH_MAX_ATTEMPTS, SETTLE_MAX_ATTEMPTS};

/// Jobs enqueued by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub settle_enqueued: usize,
    pub notify_enqueued: usize,
    pub dispatch_enqueued: usize,
}

pub struct RecoverySweepHandler {
    payments: Arc<dyn PaymentRepository>,
    outbox: Arc<dyn JobOutbox>,
    batch_size: u32,
    stale_pending_secs: u64,
    notification_max_attempts: u32,
}

impl RecoverySweepHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        outbox: Arc<dyn JobOutbox>,
        batch_size: u32,
        stale_pending_secs: u64,
        notification_max_attempts: u32,
    ) -> Self {
        Self {
            payments,
            outbox,
            batch_size,
            stale_pending_secs,
            notification_max_attempts,
        }
    }

    /// Run every sweep.
    pub async fn handle(&self) -> Result<SweepReport, PaymentError> {
        let report = SweepReport {
            settle_enqueued: self.sweep_unsettled(self.batch_size).await?,
            notify_enqueued: self.sweep_unnotified(self.batch_size).await?,
            dispatch_enqueued: self.sweep_stale_pending(self.batch_size).await?,
        };
        if report != SweepReport::default() {
            tracing::info!(
                settle_enqueued = report.settle_enqueued,
                notify_enqueued = report.notify_enqueued,
                dispatch_enqueued = report.dispatch_enqueued,
                "Recovery sweep re-enqueued jobs"
            );
        }
        Ok(report)
    }

    /// `SweepUnsettled`: settle jobs for completed payments with no
    /// settlement record.
    pub async fn sweep_unsettled(&self, limit: u32) -> Result<usize, PaymentError> {
        let mut enqueued = 0;
        for payment in self.payments.find_unsettled(limit).await? {
            let job = PaymentJob::Settle {
                payment_id: payment.id,
            };
            if self.outbox.has_open(&job).await? {
                continue;
            }
            self.outbox.enqueue(job, SETTLE_MAX_ATTEMPTS).await?;
            tracing::warn!(
                payment_ref = %payment.payment_ref,
                partner_id = %payment.partner_id,
                "Re-enqueued settlement for unsettled payment"
            );
            enqueued += 1;
        }
        Ok(enqueued)
    }

    /// Notify jobs for terminal payments the partner was never told about.
    ///
    /// Payments are only picked up once they have been final for the stale
    /// threshold, leaving the reconciling request time to enqueue its own.
    pub async fn sweep_unnotified(&self, limit: u32) -> Result<usize, PaymentError> {
        let updated_before = Timestamp::now().minus_secs(self.stale_pending_secs as i64);
        let mut enqueued = 0;
        for payment in self.payments.find_unnotified(updated_before, limit).await? {
            let job = PaymentJob::Notify {
                payment_id: payment.id,
            };
            if self.outbox.has_entry(&job).await? {
                continue;
            }
            self.outbox
                .enqueue(job, self.notification_max_attempts)
                .await?;
            tracing::warn!(
                payment_ref = %payment.payment_ref,
                partner_id = %payment.partner_id,
                status = %payment.status,
                "Re-enqueued notification for unnotified payment"
            );
            enqueued += 1;
        }
        Ok(enqueued)
    }

    /// Dispatch jobs for payments pending longer than the stale threshold.
    pub async fn sweep_stale_pending(&self, limit: u32) -> Result<usize, PaymentError> {
        let created_before = Timestamp::now().minus_secs(self.stale_pending_secs as i64);
        let mut enqueued = 0;
        for payment in self
            .payments
            .find_stale_pending(created_before, limit)
            .await?
        {
            let job = PaymentJob::Dispatch {
                payment_id: payment.id,
            };
            if self.outbox.has_open(&job).await? {
                continue;
            }
            self.outbox.enqueue(job, DISPATCH_MAX_ATTEMPTS).await?;
            tracing::warn!(
                payment_ref = %payment.payment_ref,
                partner_id = %payment.partner_id,
                "Re-enqueued dispatch for stale pending payment"
            );
            enqueued += 1;
        }
        Ok(enqueued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryJobOutbox, InMemoryPaymentStore};
    use crate::domain::payment::test_support::pending_deposit;
    use crate::domain::payment::{Payment, SettlementKind, SettlementRecord};
    use crate::ports::SettlementRepository;

    fn completed() -> Payment {
        let mut payment = pending_deposit();
        payment.start_processing().unwrap();
        payment.complete().unwrap();
        payment
    }

    fn handler(
        store: Arc<InMemoryPaymentStore>,
        outbox: Arc<InMemoryJobOutbox>,
    ) -> RecoverySweepHandler {
        RecoverySweepHandler::new(store, outbox, 50, 0, 5)
    }

    #[tokio::test]
    async fn unsettled_completed_payment_gets_one_settle_job() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let payment = completed();
        store.put_payment(payment.clone()).await;
        let sweeper = handler(store, outbox.clone());

        assert_eq!(sweeper.sweep_unsettled(10).await.unwrap(), 1);
        assert_eq!(sweeper.sweep_unsettled(10).await.unwrap(), 0);

        assert_eq!(
            outbox.entries().await[0].job,
            PaymentJob::Settle {
                payment_id: payment.id
            }
        );
    }

    #[tokio::test]
    async fn settled_payment_is_left_alone() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let mut payment = completed();
        payment.mark_partner_notified();
        store.put_payment(payment.clone()).await;
        store
            .claim(&SettlementRecord::claim(payment.id, SettlementKind::Credit))
            .await
            .unwrap();

        let report = handler(store, outbox.clone()).handle().await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert!(outbox.entries().await.is_empty());
    }

    #[tokio::test]
    async fn stale_pending_payment_is_redispatched() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let mut payment = pending_deposit();
        payment.created_at = Timestamp::now().minus_secs(600);
        store.put_payment(payment.clone()).await;

        let report = handler(store, outbox.clone()).handle().await.unwrap();

        assert_eq!(report.dispatch_enqueued, 1);
        assert_eq!(
            outbox.entries().await[0].job,
            PaymentJob::Dispatch {
                payment_id: payment.id
            }
        );
    }

    #[tokio::test]
    async fn pending_payment_with_open_dispatch_is_skipped() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let mut payment = pending_deposit();
        payment.created_at = Timestamp::now().minus_secs(600);
        store.put_payment(payment.clone()).await;
        outbox
            .enqueue(
                PaymentJob::Dispatch {
                    payment_id: payment.id,
                },
                1,
            )
            .await
            .unwrap();

        let report = handler(store, outbox.clone()).handle().await.unwrap();

        assert_eq!(report.dispatch_enqueued, 0);
        assert_eq!(outbox.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn terminal_payment_without_notify_job_gets_one() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let mut payment = pending_deposit();
        payment.start_processing().unwrap();
        payment.fail("Request cancelled by user").unwrap();
        payment.updated_at = Timestamp::now().minus_secs(600);
        store.put_payment(payment.clone()).await;
        let sweeper = handler(store, outbox.clone());

        assert_eq!(sweeper.sweep_unnotified(10).await.unwrap(), 1);
        assert_eq!(sweeper.sweep_unnotified(10).await.unwrap(), 0);

        let entries = outbox.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].job,
            PaymentJob::Notify {
                payment_id: payment.id
            }
        );
        assert_eq!(entries[0].max_attempts, 5);
    }

    #[tokio::test]
    async fn exhausted_notification_is_not_revived() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let payment = completed();
        store.put_payment(payment.clone()).await;
        let entry = outbox
            .enqueue(
                PaymentJob::Notify {
                    payment_id: payment.id,
                },
                1,
            )
            .await
            .unwrap();
        outbox.mark_failed(entry.id, "webhook down").await.unwrap();

        assert_eq!(handler(store, outbox.clone()).sweep_unnotified(10).await.unwrap(), 0);
        assert_eq!(outbox.entries().await.len(), 1);
    }
}
