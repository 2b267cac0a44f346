//! # Mentorly API Library
//!
//! Backend for the Mentorly mentoring platform: a security gate in front of
//! every request plus the mentor login and status endpoints.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and the gate middleware
//! - **SQLx**: mentor lookups against SQLite
//! - **Redis**: shared rate-limit counters, with file and memory stores as alternatives
//! - **Tokio**: async runtime and background cleanup tasks
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (embedded defaults, files, environment)
//! - [`db`]: schema initialization and mentor queries
//! - [`error`]: centralized error handling and HTTP error responses
//! - [`metrics`]: gate and endpoint counters
//! - [`middleware`]: the request gate and its stages
//! - [`routes`]: HTTP endpoint handlers and the router
//! - [`security`]: password hashing and the security event log
//! - [`session`]: cookie sessions carrying the CSRF token
//! - [`state`]: shared application state
//! - [`store`]: rate-limit counter stores
//! - [`types`]: database rows and request/response bodies

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
