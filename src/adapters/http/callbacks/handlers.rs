//! HTTP handlers for M-Pesa result and timeout callbacks.
//!
//! Bodies are read as raw bytes so a malformed payload is answered with the
//! same 400 as a payload that fails the flow parser. Any non-2xx answer makes
//! Daraja redeliver.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::adapters::http::error::{handle_payment_error, ErrorResponse};
use crate::application::{
    ReconcileCallbackCommand, ReconcileCallbackHandler, RecordQueueTimeoutCommand,
    RecordQueueTimeoutHandler,
};
use crate::domain::payment::{CallbackFlow, PaymentError};

use super::dto::{CallbackAck, CallbackQuery};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct CallbackHandlers {
    reconcile_handler: Arc<ReconcileCallbackHandler>,
    queue_timeout_handler: Arc<RecordQueueTimeoutHandler>,
}

impl CallbackHandlers {
    pub fn new(
        reconcile_handler: Arc<ReconcileCallbackHandler>,
        queue_timeout_handler: Arc<RecordQueueTimeoutHandler>,
    ) -> Self {
        Self {
            reconcile_handler,
            queue_timeout_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /callbacks/mpesa/stk/:payment_ref
pub async fn stk_callback(
    State(handlers): State<CallbackHandlers>,
    Path(payment_ref): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    reconcile(&handlers, CallbackFlow::Stk, payment_ref, query, body).await
}

/// POST /callbacks/mpesa/b2c/:payment_ref
pub async fn b2c_callback(
    State(handlers): State<CallbackHandlers>,
    Path(payment_ref): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    reconcile(&handlers, CallbackFlow::B2c, payment_ref, query, body).await
}

/// POST /callbacks/mpesa/b2b/:payment_ref
pub async fn b2b_callback(
    State(handlers): State<CallbackHandlers>,
    Path(payment_ref): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    reconcile(&handlers, CallbackFlow::B2b, payment_ref, query, body).await
}

async fn reconcile(
    handlers: &CallbackHandlers,
    flow: CallbackFlow,
    payment_ref: String,
    query: CallbackQuery,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => return handle_payment_error(PaymentError::parse(flow, e.to_string())),
    };
    let cmd = ReconcileCallbackCommand {
        flow,
        payment_ref,
        token: query.token,
        payload,
    };

    match handlers.reconcile_handler.handle(cmd).await {
        Ok(_) => (StatusCode::OK, Json(CallbackAck::accepted())).into_response(),
        Err(e) => handle_payment_error(e),
    }
}

/// POST /callbacks/mpesa/timeout/:payment_ref - Request expired in the provider queue
pub async fn queue_timeout_callback(
    State(handlers): State<CallbackHandlers>,
    Path(payment_ref): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(format!(
                    "timeout payload is not JSON: {}",
                    e
                ))),
            )
                .into_response()
        }
    };
    let cmd = RecordQueueTimeoutCommand {
        payment_ref,
        token: query.token,
        payload,
    };

    match handlers.queue_timeout_handler.handle(cmd).await {
        Ok(()) => (StatusCode::OK, Json(CallbackAck::accepted())).into_response(),
        Err(e) => handle_payment_error(e),
    }
}
