//! HTTP handlers for payment intake and status endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::handle_payment_error;
use crate::application::{
    GetPaymentHandler, GetPaymentQuery, InitiatePaymentCommand, InitiatePaymentHandler,
};
use crate::domain::payment::PaymentType;

use super::dto::{InitiatePaymentRequest, InitiatePaymentResponse, PaymentResponse};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct PaymentHandlers {
    initiate_handler: Arc<InitiatePaymentHandler>,
    get_handler: Arc<GetPaymentHandler>,
}

impl PaymentHandlers {
    pub fn new(
        initiate_handler: Arc<InitiatePaymentHandler>,
        get_handler: Arc<GetPaymentHandler>,
    ) -> Self {
        Self {
            initiate_handler,
            get_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/v1/payments/deposits - Collect money from a user
pub async fn initiate_deposit(
    State(handlers): State<PaymentHandlers>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Response {
    initiate(&handlers, req, PaymentType::Deposit).await
}

/// POST /api/v1/payments/withdrawals - Pay money out to a user
pub async fn initiate_withdrawal(
    State(handlers): State<PaymentHandlers>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Response {
    initiate(&handlers, req, PaymentType::Withdrawal).await
}

async fn initiate(
    handlers: &PaymentHandlers,
    req: InitiatePaymentRequest,
    payment_type: PaymentType,
) -> Response {
    let request = match req.into_new_payment(payment_type) {
        Ok(request) => request,
        Err(e) => return handle_payment_error(e),
    };
    let cmd = match payment_type {
        PaymentType::Deposit => InitiatePaymentCommand::deposit(request),
        PaymentType::Withdrawal => InitiatePaymentCommand::withdrawal(request),
    };

    match handlers.initiate_handler.handle(cmd).await {
        Ok(result) => {
            // 202 while the provider request is still to be sent; 200 for a replay
            let status = if result.replayed {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            let response = InitiatePaymentResponse {
                payment: PaymentResponse::from(&result.payment),
                replayed: result.replayed,
            };
            (status, Json(response)).into_response()
        }
        Err(e) => handle_payment_error(e),
    }
}

/// GET /api/v1/payments/:partner_id/:transaction_ref - Current payment state
pub async fn get_payment(
    State(handlers): State<PaymentHandlers>,
    Path((partner_id, transaction_ref)): Path<(String, String)>,
) -> Response {
    let query = GetPaymentQuery {
        partner_id,
        transaction_ref,
    };

    match handlers.get_handler.handle(query).await {
        Ok(payment) => (StatusCode::OK, Json(PaymentResponse::from(&payment))).into_response(),
        Err(e) => handle_payment_error(e),
    }
}
