//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `PaymentRepository` - Payment rows with compare-and-set status changes
//! - `ProviderTransactionRepository` - Provider attempts, looked up by
//!   correlation key
//! - `SettlementRepository` - At-most-once settlement claims
//!
//! ## External Service Ports
//!
//! - `MobileMoneyProvider` - STK push / B2C / B2B requests
//! - `CallbackParser` - Provider webhook bodies to `CallbackResult`
//! - `PartnerLedger` - Credit and debit partner balances
//! - `PartnerNotifier` - Status webhooks to partners
//!
//! ## Background Work Ports
//!
//! - `JobOutbox` - Durable queue of dispatch / settle / notify jobs
//! - `JobHandler` - Executes one claimed job

mod callback_parser;
mod job_handler;
mod job_outbox;
mod mobile_money_provider;
mod partner_ledger;
mod partner_notifier;
mod payment_repository;
mod provider_transaction_repository;
mod settlement_repository;

pub use callback_parser::CallbackParser;
pub use job_handler::{JobError, JobHandler};
pub use job_outbox::{JobOutbox, JobStatus, OutboxEntry};
pub use mobile_money_provider::{
    B2bRequest, B2cRequest, MobileMoneyProvider, ProviderAck, ProviderError, ProviderErrorCode,
    StkPushRequest,
};
pub use partner_ledger::{LedgerReceipt, LedgerRequest, PartnerError, PartnerLedger};
pub use partner_notifier::{PartnerNotifier, StatusNotification};
pub use payment_repository::{CreateOutcome, PaymentRepository};
pub use provider_transaction_repository::ProviderTransactionRepository;
pub use settlement_repository::{ClaimResult, SettlementRepository};
