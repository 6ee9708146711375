//! RecoverySweeper - Periodic run of the recovery sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::RecoverySweepHandler;

pub struct RecoverySweeper {
    sweep: Arc<RecoverySweepHandler>,
    interval: Duration,
}

impl RecoverySweeper {
    pub fn new(sweep: Arc<RecoverySweepHandler>, interval: Duration) -> Self {
        Self { sweep, interval }
    }

    /// Sweep on every tick until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Recovery sweeper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.sweep.handle().await {
                        tracing::error!(error = %e, "Recovery sweep failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryJobOutbox, InMemoryPaymentStore};
    use crate::domain::foundation::Timestamp;
    use crate::domain::payment::test_support::pending_deposit;
    use crate::domain::payment::PaymentJob;

    #[tokio::test]
    async fn sweeps_until_shutdown() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let outbox = Arc::new(InMemoryJobOutbox::new());
        let mut payment = pending_deposit();
        payment.created_at = Timestamp::now().minus_secs(600);
        store.put_payment(payment.clone()).await;
        let sweeper = RecoverySweeper::new(
            Arc::new(RecoverySweepHandler::new(store, outbox.clone(), 10, 60, 5)),
            Duration::from_millis(10),
        );
        let (tx, rx) = watch::channel(false);

        let running = tokio::spawn(async move { sweeper.run(rx).await });
        time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        time::timeout(Duration::from_secs(1), running)
            .await
            .expect("sweeper did not stop")
            .unwrap();

        let entries = outbox.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].job,
            PaymentJob::Dispatch {
                payment_id: payment.id
            }
        );
    }
}
