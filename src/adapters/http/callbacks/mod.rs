//! HTTP adapter for inbound provider webhooks.

mod dto;
mod handlers;
mod routes;

pub use dto::{CallbackAck, CallbackQuery};
pub use handlers::CallbackHandlers;
pub use routes::callback_routes;
