//! M-Pesa (Safaricom Daraja) adapter.
//!
//! Implements the `MobileMoneyProvider` port (STK push, B2C, B2B) and the
//! `CallbackParser` port for Daraja webhooks.
//!
//! # Security
//!
//! - Consumer secret, passkey and initiator credential are held as
//!   `secrecy::SecretString`
//! - Password and security credential are redacted from stored request
//!   payloads
//! - Callback URLs may carry an HMAC token (see `CallbackUrls`)

mod callback_parser;
mod client;
mod mock_provider;
mod wire;

pub use callback_parser::{MpesaCallbackParser, PayloadShape, ShapedResult};
pub use client::MpesaClient;
pub use mock_provider::{MockMobileMoneyProvider, ProviderCall};
pub use wire::{stk_password, whole_units};
