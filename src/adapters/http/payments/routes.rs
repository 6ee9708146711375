//! HTTP routes for payment endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{get_payment, initiate_deposit, initiate_withdrawal, PaymentHandlers};

/// Creates the payment router, mounted under `/api/v1/payments`.
pub fn payment_routes(handlers: PaymentHandlers) -> Router {
    Router::new()
        .route("/deposits", post(initiate_deposit))
        .route("/withdrawals", post(initiate_withdrawal))
        .route("/:partner_id/:transaction_ref", get(get_payment))
        .with_state(handlers)
}
