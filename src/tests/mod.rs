//! Router-level tests and shared fixtures.

mod config_tests;
mod health_tests;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::middleware::auth::JwtClaims;
use crate::security::SecurityEventLog;
use crate::state::AppState;
use crate::store::{CounterStore, MemoryCounterStore};

pub(crate) const TEST_SECRET: &str = "test-secret";
pub(crate) const ALLOWED_ORIGIN: &str = "https://app.mentorly.id";

/// A single-connection in-memory database; the connection must never be recycled.
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

pub(crate) fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.security.jwt_secret = TEST_SECRET.to_string();
    cfg.security.allowed_origins = format!("{},http://localhost:3000", ALLOWED_ORIGIN);
    cfg.security.security_log = String::new();
    cfg.database.url = "sqlite::memory:".to_string();
    cfg
}

pub(crate) async fn test_app_with(cfg: AppConfig, store: Arc<dyn CounterStore>) -> (Router, AppState) {
    let state = AppState::new(test_pool().await, cfg, store, SecurityEventLog::disabled());
    (crate::routes::router(state.clone()), state)
}

pub(crate) async fn test_app() -> (Router, AppState) {
    test_app_with(test_config(), Arc::new(MemoryCounterStore::new())).await
}

pub(crate) async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub(crate) async fn body_bytes(res: Response<Body>) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub(crate) async fn body_json(res: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

pub(crate) fn sign_token(sub: Value, exp: Option<i64>) -> String {
    let claims = JwtClaims { sub: Some(sub), user_id: None, exp: exp.map(Value::from) };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
}

pub(crate) fn in_an_hour() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

/// A session cookie (`name=value`) and the CSRF token pinned to it.
pub(crate) struct CsrfSession {
    pub cookie: String,
    pub token: String,
}

pub(crate) async fn fetch_csrf(app: &Router, ip: &str) -> CsrfSession {
    let req = Request::get("/api/csrf-token").header("x-forwarded-for", ip).body(Body::empty()).unwrap();
    let res = send(app, req).await;
    let set_cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let token = body_json(res).await["csrf_token"].as_str().unwrap().to_string();
    CsrfSession { cookie, token }
}

/// A form POST carrying the session cookie and CSRF header.
pub(crate) fn csrf_form_post(uri: &str, ip: &str, session: &CsrfSession, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, &session.cookie)
        .header("x-csrf-token", &session.token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A form POST exempt from CSRF through a verified bearer token.
pub(crate) fn bearer_form_post(uri: &str, ip: &str, token: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}
