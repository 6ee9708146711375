//! Payment command and query handlers.

mod dispatch_payment;
mod get_payment;
mod initiate_payment;
mod job_executor;
mod notify_partner;
mod provider_registry;
mod reconcile_callback;
mod record_queue_timeout;
mod recovery_sweep;
mod settle_payment;

pub use dispatch_payment::{DispatchOutcome, DispatchPaymentHandler};
pub use get_payment::{GetPaymentHandler, GetPaymentQuery};
pub use initiate_payment::{
    InitiatePaymentCommand, InitiatePaymentHandler, InitiatePaymentResult, DISPATCH_MAX_ATTEMPTS,
};
pub use job_executor::PaymentJobExecutor;
pub use notify_partner::NotifyPartnerHandler;
pub use provider_registry::ProviderRegistry;
pub use reconcile_callback::{
    ReconcileCallbackCommand, ReconcileCallbackHandler, ReconcileOutcome, SETTLE_MAX_ATTEMPTS,
};
pub use record_queue_timeout::{RecordQueueTimeoutCommand, RecordQueueTimeoutHandler};
pub use recovery_sweep::{RecoverySweepHandler, SweepReport};
pub use settle_payment::{SettleOutcome, SettlePaymentHandler};
