//! Background services - outbox worker pool and recovery sweeper.
//!
//! Both loops stop on a `tokio::sync::watch` shutdown signal.

mod sweeper;
mod worker;

pub use sweeper::RecoverySweeper;
pub use worker::{backoff_delay_secs, OutboxWorker};
