//! Middleware components for HTTP request processing.
//!
//! [`gate`] composes the other modules into the single security pipeline
//! every request passes through.

pub mod auth;
pub mod csrf;
pub mod gate;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use gate::{request_gate_middleware, RequestGate};
