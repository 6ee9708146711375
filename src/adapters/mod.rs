//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - axum routes for partners and provider webhooks
//! - `jobs` - Outbox worker pool and recovery sweeper
//! - `memory` - In-memory stores for tests and local runs
//! - `mpesa` - Safaricom Daraja client and callback parser
//! - `partner` - Partner ledger and webhook clients
//! - `postgres` - sqlx repositories and job outbox

pub mod http;
pub mod jobs;
pub mod memory;
pub mod mpesa;
pub mod partner;
pub mod postgres;

pub use jobs::{OutboxWorker, RecoverySweeper};
pub use memory::{InMemoryJobOutbox, InMemoryPaymentStore};
pub use mpesa::{MockMobileMoneyProvider, MpesaCallbackParser, MpesaClient};
pub use partner::{HttpPartnerClient, RecordingPartnerLedger, RecordingPartnerNotifier};
pub use postgres::{
    PostgresJobOutbox, PostgresPaymentRepository, PostgresProviderTransactionRepository,
    PostgresSettlementRepository,
};
