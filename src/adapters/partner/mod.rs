//! Partner adapters - external ledgers and status webhooks.

mod http_client;
mod recording;

pub use http_client::{sign, HttpPartnerClient, API_KEY_HEADER, SIGNATURE_HEADER};
pub use recording::{LedgerCall, RecordingPartnerLedger, RecordingPartnerNotifier};
