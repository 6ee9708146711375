//! HTTP adapter for partner-facing payment endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::{InitiatePaymentRequest, InitiatePaymentResponse, PaymentResponse};
pub use handlers::PaymentHandlers;
pub use routes::payment_routes;
