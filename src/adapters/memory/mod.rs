//! In-memory adapters for tests and database-less local runs.

mod job_outbox;
mod payment_store;

pub use job_outbox::InMemoryJobOutbox;
pub use payment_store::InMemoryPaymentStore;
