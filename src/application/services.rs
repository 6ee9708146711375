//! Wiring of payment handlers over a set of port implementations.

use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::domain::payment::CallbackUrls;
use crate::ports::{
    CallbackParser, JobOutbox, PartnerLedger, PartnerNotifier, PaymentRepository,
    ProviderTransactionRepository, SettlementRepository,
};

use super::handlers::payment::{
    DispatchPaymentHandler, GetPaymentHandler, InitiatePaymentHandler, NotifyPartnerHandler,
    PaymentJobExecutor, ProviderRegistry, ReconcileCallbackHandler, RecordQueueTimeoutHandler,
    RecoverySweepHandler, SettlePaymentHandler,
};

/// Port implementations the handlers run on.
#[derive(Clone)]
pub struct PaymentPorts {
    pub payments: Arc<dyn PaymentRepository>,
    pub transactions: Arc<dyn ProviderTransactionRepository>,
    pub settlements: Arc<dyn SettlementRepository>,
    pub outbox: Arc<dyn JobOutbox>,
    pub providers: ProviderRegistry,
    pub callback_parser: Arc<dyn CallbackParser>,
    pub ledger: Arc<dyn PartnerLedger>,
    pub notifier: Arc<dyn PartnerNotifier>,
    pub callback_urls: CallbackUrls,
}

/// Every payment handler, built once at startup.
#[derive(Clone)]
pub struct PaymentServices {
    pub initiate: Arc<InitiatePaymentHandler>,
    pub get: Arc<GetPaymentHandler>,
    pub reconcile: Arc<ReconcileCallbackHandler>,
    pub queue_timeout: Arc<RecordQueueTimeoutHandler>,
    pub dispatch: Arc<DispatchPaymentHandler>,
    pub settle: Arc<SettlePaymentHandler>,
    pub notify: Arc<NotifyPartnerHandler>,
    pub executor: Arc<PaymentJobExecutor>,
    pub sweep: Arc<RecoverySweepHandler>,
}

impl PaymentServices {
    pub fn new(ports: PaymentPorts, worker: &WorkerConfig) -> Self {
        let notify_attempts = worker.notification_max_attempts;

        let dispatch = Arc::new(DispatchPaymentHandler::new(
            ports.payments.clone(),
            ports.transactions.clone(),
            ports.outbox.clone(),
            ports.providers.clone(),
            ports.callback_urls.clone(),
            notify_attempts,
        ));
        let settle = Arc::new(SettlePaymentHandler::new(
            ports.payments.clone(),
            ports.settlements.clone(),
            ports.ledger.clone(),
        ));
        let notify = Arc::new(NotifyPartnerHandler::new(
            ports.payments.clone(),
            ports.notifier.clone(),
        ));

        Self {
            initiate: Arc::new(InitiatePaymentHandler::new(
                ports.payments.clone(),
                ports.outbox.clone(),
                ports.providers.clone(),
            )),
            get: Arc::new(GetPaymentHandler::new(ports.payments.clone())),
            reconcile: Arc::new(ReconcileCallbackHandler::new(
                ports.payments.clone(),
                ports.transactions.clone(),
                ports.outbox.clone(),
                ports.callback_parser.clone(),
                ports.callback_urls.clone(),
                notify_attempts,
            )),
            queue_timeout: Arc::new(RecordQueueTimeoutHandler::new(
                ports.payments.clone(),
                ports.callback_urls.clone(),
            )),
            executor: Arc::new(PaymentJobExecutor::new(
                dispatch.clone(),
                settle.clone(),
                notify.clone(),
            )),
            sweep: Arc::new(RecoverySweepHandler::new(
                ports.payments,
                ports.outbox,
                worker.sweep_batch_size,
                worker.stale_pending_secs,
                notify_attempts,
            )),
            dispatch,
            settle,
            notify,
        }
    }
}
