//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `payment` - Payment lifecycle, provider attempts, settlement and callbacks

pub mod foundation;
pub mod payment;
