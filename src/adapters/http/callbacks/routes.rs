//! HTTP routes for provider callbacks.

use axum::{routing::post, Router};

use super::handlers::{
    b2b_callback, b2c_callback, queue_timeout_callback, stk_callback, CallbackHandlers,
};

/// Creates the callback router, mounted under `/callbacks/mpesa`.
pub fn callback_routes(handlers: CallbackHandlers) -> Router {
    Router::new()
        .route("/stk/:payment_ref", post(stk_callback))
        .route("/b2c/:payment_ref", post(b2c_callback))
        .route("/b2b/:payment_ref", post(b2b_callback))
        .route("/timeout/:payment_ref", post(queue_timeout_callback))
        .with_state(handlers)
}
