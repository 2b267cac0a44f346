use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no dependencies
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "not ready: database").into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters = [
        ("requests_total", "Requests seen by the gate", m.requests_total),
        ("preflight_total", "CORS preflight requests answered", m.preflight_total),
        ("rate_limited_total", "Requests rejected by the rate limiter", m.rate_limited_total),
        ("csrf_rejected_total", "Requests rejected by CSRF validation", m.csrf_rejected_total),
        ("store_failures_total", "Counter store failures", m.store_failures_total),
        ("logins_succeeded_total", "Successful mentor logins", m.logins_succeeded),
        ("logins_failed_total", "Failed mentor logins", m.logins_failed),
        ("status_checks_total", "Mentor status lookups", m.status_checks),
    ];
    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!(
            "# HELP mentorly_{name} {help}\n# TYPE mentorly_{name} counter\nmentorly_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP mentorly_uptime_seconds Uptime seconds\n# TYPE mentorly_uptime_seconds gauge\nmentorly_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "rate_limit_store": state.gate.rate_limiter().store_name(),
    });
    (StatusCode::OK, Json(body))
}
