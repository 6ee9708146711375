//! Pesa Bridge - Mobile-money payment gateway
//!
//! Accepts deposit and withdrawal requests from partner platforms, dispatches
//! them to M-Pesa (STK push, B2C, B2B), reconciles the asynchronous provider
//! callbacks and settles completed payments against the partner's ledger.
//!
//! # Layers
//!
//! - `domain` - Payment aggregate, state machines and callback shapes
//! - `ports` - Traits the application depends on
//! - `application` - Command, query and job handlers
//! - `adapters` - HTTP, Daraja, partner, Postgres and in-memory implementations
//! - `config` - Environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
