//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Commands that reach third parties only enqueue jobs; the worker pool runs
//! the jobs through `PaymentJobExecutor`.

pub mod handlers;
mod services;

pub use handlers::{
    DispatchOutcome, DispatchPaymentHandler, GetPaymentHandler, GetPaymentQuery,
    InitiatePaymentCommand, InitiatePaymentHandler, InitiatePaymentResult, NotifyPartnerHandler,
    PaymentJobExecutor, ProviderRegistry, ReconcileCallbackCommand, ReconcileCallbackHandler,
    ReconcileOutcome, RecordQueueTimeoutCommand, RecordQueueTimeoutHandler, RecoverySweepHandler,
    SettleOutcome, SettlePaymentHandler, SweepReport,
};
pub use services::{PaymentPorts, PaymentServices};
