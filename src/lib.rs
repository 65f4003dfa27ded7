//! EchoBox: a small account + feedback service.
//!
//! Accounts register and log in against a SQLite credential store, get a
//! signed bearer token back, and use it to submit and list their own
//! feedback. Everything is served by one axum gateway.

pub mod auth;
pub mod config;
pub mod error;
pub mod feedback;
pub mod gateway;

pub use error::{Error, Result};

/// Crate version, exposed by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
