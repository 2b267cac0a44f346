use axum::http::StatusCode;
use serde_json::json;

use super::*;

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = test_app().await;
    let res = send(&app, get("/healthz")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, b"ok");
}

#[tokio::test]
async fn test_readyz_tracks_database() {
    let (app, state) = test_app().await;
    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::OK);

    state.db.close().await;
    assert_eq!(send(&app, get("/readyz")).await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_json_counts_gate_activity() {
    let (app, _) = test_app().await;
    send(&app, get("/healthz")).await;
    let token = sign_token(json!("m1"), None);
    send(&app, bearer_form_post("/api/mentors/status", "10.5.0.1", &token, "uid=nobody")).await;

    let res = send(&app, get("/metrics")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let m = body_json(res).await;
    assert_eq!(m["requests_total"], 3);
    assert_eq!(m["status_checks"], 1);
    assert_eq!(m["rate_limited_total"], 0);
    assert!(m["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_metrics_prometheus_format() {
    let (app, _) = test_app().await;
    let res = send(&app, get("/metrics/prometheus")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    let text = String::from_utf8(body_bytes(res).await).unwrap();
    assert!(text.contains("# TYPE mentorly_requests_total counter"));
    assert!(text.contains("mentorly_requests_total 1\n"));
    assert!(text.contains("mentorly_csrf_rejected_total 0\n"));
    assert!(text.contains("# TYPE mentorly_uptime_seconds gauge"));
}

#[tokio::test]
async fn test_version_reports_store() {
    let (app, _) = test_app().await;
    let body = body_json(send(&app, get("/version")).await).await;
    assert_eq!(body["name"], "mentorly-api");
    assert_eq!(body["rate_limit_store"], "memory");
}
