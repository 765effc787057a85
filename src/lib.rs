//! EnvelopeAPI - HTTP JSON API for envelope budgeting data
//!
//! Each API route forwards to one operation of a budgeting client and
//! serializes the result as JSON. The client is started lazily, once, by the
//! first request that needs it.
//!
//! # Architecture
//!
//! - `config`: Command-line / environment settings and data directory layout
//! - `error`: Budgeting client error types
//! - `bootstrap`: Single-flight client startup and default budget selection
//! - `server`: HTTP server, router and shared state
//! - `api`: HTTP handlers and error responses
//! - `client`: The `BudgetClient` capability and its file-backed implementation
//! - `services`: Budgeting operations over a loaded budget
//! - `storage`: JSON file storage layer
//! - `models`: Core data models (accounts, transactions, categories, etc.)
//!
//! # Example
//!
//! ```rust,ignore
//! use clap::Parser;
//! use envelope_api::config::Settings;
//!
//! let settings = Settings::parse();
//! envelope_api::server::start(settings).await?;
//! ```

pub mod api;
pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod storage;

pub use error::{EnvelopeError, EnvelopeResult};
