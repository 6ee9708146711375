//! Callback parser port - turns a raw provider webhook into a CallbackResult.

use serde_json::Value;

use crate::domain::payment::{CallbackFlow, CallbackResult, PaymentError, Provider};

/// Provider-specific webhook parsing.
///
/// Parsing is pure: no I/O, no lookups. Failures are
/// [`PaymentError::CallbackParse`].
pub trait CallbackParser: Send + Sync {
    fn provider(&self) -> Provider;

    fn parse(&self, flow: CallbackFlow, payload: &Value) -> Result<CallbackResult, PaymentError>;
}
