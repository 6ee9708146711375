//! HTTP adapters - REST API and provider webhook endpoints.
//!
//! - `/api/v1/payments` - partner intake and status queries
//! - `/callbacks/mpesa` - Daraja result and queue-timeout callbacks
//! - `/health` - liveness

pub mod callbacks;
mod error;
mod health;
pub mod payments;

pub use callbacks::{callback_routes, CallbackAck, CallbackHandlers};
pub use error::{handle_payment_error, ErrorResponse};
pub use health::{health, health_routes, HealthResponse};
pub use payments::{payment_routes, PaymentHandlers};

use std::time::Duration;

use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::application::PaymentServices;

/// Full application router without middleware.
pub fn api_router(services: &PaymentServices) -> Router {
    let payments = PaymentHandlers::new(services.initiate.clone(), services.get.clone());
    let callbacks = CallbackHandlers::new(services.reconcile.clone(), services.queue_timeout.clone());

    Router::new()
        .nest("/api/v1/payments", payment_routes(payments))
        .nest("/callbacks/mpesa", callback_routes(callbacks))
        .merge(health_routes())
}

/// Application router with request tracing, request ids and a request timeout.
pub fn app_router(services: &PaymentServices, request_timeout: Duration) -> Router {
    api_router(services)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
