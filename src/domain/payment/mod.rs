//! Payment domain module.
//!
//! Everything the gateway knows about a partner-initiated money movement:
//! the Payment aggregate, the provider-side attempt, settlement bookkeeping
//! and the parsed shape of provider callbacks.
//!
//! # Module Structure
//!
//! - `payment` - Payment aggregate entity
//! - `provider_transaction` - One provider API attempt
//! - `status` - Payment / provider transaction state machines
//! - `settlement` - Settlement records keyed by payment and kind
//! - `callback` - Parsed provider webhook
//! - `callback_urls` - Signed callback URLs
//! - `metadata` - Currency-conversion metadata
//! - `job` - Background jobs written to the outbox

mod callback;
mod callback_urls;
mod errors;
mod job;
mod metadata;
#[allow(clippy::module_inception)]
mod payment;
mod phone;
mod provider_transaction;
mod settlement;
mod status;
mod types;

pub use callback::{CallbackFlow, CallbackResult, RESULT_CODE_SUCCESS};
pub use callback_urls::{hex_encode, CallbackUrls};
pub use errors::{ErrorContext, PaymentError};
pub use job::PaymentJob;
pub use metadata::PaymentMetadata;
pub use payment::{LocalAmount, NewPayment, Payment};
pub use phone::normalize_msisdn;
pub use provider_transaction::ProviderTransaction;
pub use settlement::{SettlementKind, SettlementRecord, SettlementStatus};
pub use status::{PaymentStatus, ProviderTransactionStatus};
pub use types::{PaymentType, Provider, TransactionType};

#[cfg(test)]
pub(crate) use payment::test_support;
