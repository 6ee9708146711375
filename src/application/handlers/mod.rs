//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod payment;

pub use payment::{
    // Commands and queries
    GetPaymentQuery,
    InitiatePaymentCommand,
    ReconcileCallbackCommand,
    RecordQueueTimeoutCommand,
    // Handlers
    DispatchPaymentHandler,
    GetPaymentHandler,
    InitiatePaymentHandler,
    NotifyPartnerHandler,
    ReconcileCallbackHandler,
    RecordQueueTimeoutHandler,
    RecoverySweepHandler,
    SettlePaymentHandler,
    // Outcomes
    DispatchOutcome,
    InitiatePaymentResult,
    ReconcileOutcome,
    SettleOutcome,
    SweepReport,
    // Jobs and routing
    PaymentJobExecutor,
    ProviderRegistry,
};
