//! HTTP route handlers for the Mentorly API.
//!
//! - `health`: health, readiness, metrics and version endpoints
//! - `mentors`: mentor login and verification status
//! - `csrf`: CSRF token issuance
//!
//! [`router`] wires them behind the request gate.

pub mod csrf;
pub mod health;
pub mod mentors;

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{header, Extensions, HeaderMap},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{ip::extract_ip_from_headers, request_gate_middleware};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let gate = state.gate.clone();

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/api/csrf-token", get(csrf::csrf_token))
        .route("/api/auth/login", post(mentors::login))
        .route("/api/mentors/status", post(mentors::status))
        .with_state(state)
        .layer(from_fn_with_state(gate, request_gate_middleware))
        .layer(TraceLayer::new_for_http())
}

pub(crate) fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> IpAddr {
    let peer = extensions.get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());
    extract_ip_from_headers(headers, peer)
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok())
}
