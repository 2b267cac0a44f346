//! The per-request security pipeline.
//!
//! Every request runs header injection, rate limiting, CSRF validation and
//! input sanitization in that order. The first failing stage writes the
//! terminal response. Security and CORS headers are computed up front and
//! merged into whatever response the request ends with.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;

use super::auth::{bearer_token, inspect_token, TokenStatus};
use super::csrf::{is_state_changing, is_token_exempt, CsrfGuard};
use super::ip::extract_ip_from_headers;
use super::rate_limit::{Actor, RateLimitOutcome, RateLimitStatus, RateLimiter};
use super::security_headers::{apply_cors_headers, apply_security_headers};
use super::validation::{form_field, sanitize_body, sanitize_cookies, sanitize_for_logging, sanitize_form, BodyKind};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::security::{SecurityEvent, SecurityEventLog};
use crate::session::SessionStore;
use crate::store::CounterStore;

pub struct RequestGate {
    jwt_secret: Vec<u8>,
    allowed_origins: Vec<String>,
    enable_hsts: bool,
    trust_unverified_token_subject: bool,
    fail_open: bool,
    max_body_bytes: usize,
    rate_limiter: RateLimiter,
    csrf: CsrfGuard,
    events: SecurityEventLog,
    metrics: Metrics,
}

impl RequestGate {
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn CounterStore>,
        sessions: SessionStore,
        events: SecurityEventLog,
        metrics: Metrics,
    ) -> Self {
        Self {
            jwt_secret: cfg.security.jwt_secret.as_bytes().to_vec(),
            allowed_origins: cfg.security.allowed_origins(),
            enable_hsts: cfg.security.enable_hsts,
            trust_unverified_token_subject: cfg.security.trust_unverified_token_subject,
            fail_open: cfg.rate_limit.fail_open,
            max_body_bytes: cfg.security.max_body_bytes,
            rate_limiter: RateLimiter::new(store, &cfg.rate_limit),
            csrf: CsrfGuard::new(sessions, &cfg.security),
            events,
            metrics,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Chooses the rate-limit bucket for a request.
    ///
    /// Verified claims always identify the user. Claims from a rejected token
    /// do so only when `trust_unverified_token_subject` is set.
    pub fn actor(&self, token: Option<&TokenStatus>, ip: IpAddr) -> Actor {
        let subject = match token {
            Some(TokenStatus::Verified(claims)) => claims.subject(),
            Some(TokenStatus::Rejected { claims: Some(claims), .. }) if self.trust_unverified_token_subject => {
                claims.subject()
            }
            _ => None,
        };
        subject.map_or(Actor::Ip(ip), Actor::User)
    }

    pub async fn handle(&self, req: Request, next: Next) -> Response {
        self.metrics.inc_requests();

        let uri = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let mut outgoing = HeaderMap::new();
        apply_security_headers(&mut outgoing, &uri, self.enable_hsts);
        apply_cors_headers(&mut outgoing, req.headers(), &self.allowed_origins);

        if req.method() == Method::OPTIONS {
            self.metrics.inc_preflight();
            return with_headers(StatusCode::NO_CONTENT.into_response(), outgoing);
        }

        let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip());
        let client_ip = extract_ip_from_headers(req.headers(), peer);
        let user_agent = req.headers().get(header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);
        let token = bearer_token(req.headers()).map(|t| inspect_token(t, &self.jwt_secret));
        let actor = self.actor(token.as_ref(), client_ip);

        match self.rate_limiter.check(&actor, &uri).await {
            RateLimitOutcome::Allowed(status) => insert_rate_limit_headers(&mut outgoing, status),
            RateLimitOutcome::Limited { retry_after } => {
                self.metrics.inc_rate_limited();
                self.events.record(
                    SecurityEvent::new("rate_limit_exceeded", Some(client_ip), user_agent.as_deref())
                        .detail("identifier", actor.identifier())
                        .detail("uri", sanitize_for_logging(&uri))
                        .detail("retry_after", retry_after),
                );
                return with_headers(AppError::RateLimited { retry_after }.into_response(), outgoing);
            }
            RateLimitOutcome::Unavailable(e) => {
                self.metrics.inc_store_failures();
                tracing::warn!(store = self.rate_limiter.store_name(), fail_open = self.fail_open, "Rate limit check failed: {}", e);
                if !self.fail_open {
                    return with_headers(AppError::ServiceUnavailable(e.to_string()).into_response(), outgoing);
                }
            }
        }

        let (mut parts, body) = req.into_parts();
        let kind = BodyKind::detect(&parts.headers);
        let (body, buffered) = if kind.is_buffered() {
            match buffer_body(body, self.max_body_bytes).await {
                Ok(bytes) => (Body::empty(), Some(bytes)),
                Err(e) => return with_headers(e.into_response(), outgoing),
            }
        } else {
            (body, None)
        };

        if is_state_changing(&parts.method) && !is_token_exempt(token.as_ref()) {
            let field = match (kind, &buffered) {
                (BodyKind::Form, Some(bytes)) => form_field(bytes, self.csrf.field_name()),
                _ => None,
            };
            if !self.csrf.validate(&parts.headers, field).await {
                self.metrics.inc_csrf_rejected();
                self.events.record(
                    SecurityEvent::new("csrf_validation_failed", Some(client_ip), user_agent.as_deref())
                        .detail("method", parts.method.as_str())
                        .detail("uri", sanitize_for_logging(&uri)),
                );
                return with_headers(AppError::CsrfRejected.into_response(), outgoing);
            }
        }

        sanitize_query(&mut parts.uri);
        sanitize_cookies(&mut parts.headers);
        let body = match buffered {
            Some(bytes) => {
                let bytes = match sanitize_body(kind, &bytes) {
                    Some(cleaned) => {
                        parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
                        Bytes::from(cleaned)
                    }
                    None => bytes,
                };
                Body::from(bytes)
            }
            None => body,
        };

        let res = next.run(Request::from_parts(parts, body)).await;
        with_headers(res, outgoing)
    }
}

pub async fn request_gate_middleware(State(gate): State<Arc<RequestGate>>, req: Request, next: Next) -> Response {
    gate.handle(req, next).await
}

/// Reads the whole body. Only exceeding `limit` is a 413; a body stream that
/// fails for any other reason is a 400.
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if exceeds_limit(&e) {
            AppError::PayloadTooLarge { limit }
        } else {
            tracing::debug!("Failed to read request body: {}", e);
            AppError::BadRequest("Invalid request body".into())
        }
    })
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn with_headers(mut res: Response, headers: HeaderMap) -> Response {
    res.headers_mut().extend(headers);
    res
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, status: RateLimitStatus) {
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(status.limit));
    headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(status.remaining));
    headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(status.reset_at));
}

/// Rewrites the query string with sanitized values. Unchanged queries keep their bytes.
fn sanitize_query(uri: &mut Uri) {
    let Some(query) = uri.query() else {
        return;
    };
    let Some(cleaned) = sanitize_form(query.as_bytes()) else {
        return;
    };
    let path_and_query =
        if cleaned.is_empty() { uri.path().to_string() } else { format!("{}?{}", uri.path(), cleaned) };

    let mut parts = uri.clone().into_parts();
    match path_and_query.parse() {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(e) => {
            tracing::debug!("Sanitized query not representable: {}", e);
            return;
        }
    }
    match Uri::from_parts(parts) {
        Ok(rebuilt) => *uri = rebuilt,
        Err(e) => tracing::debug!("Failed to rebuild URI: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::{JwtClaims, TokenRejection};
    use crate::store::MemoryCounterStore;
    use serde_json::json;

    fn gate(trust_unverified: bool) -> RequestGate {
        let mut cfg = AppConfig::default();
        cfg.security.trust_unverified_token_subject = trust_unverified;
        RequestGate::new(
            &cfg,
            Arc::new(MemoryCounterStore::new()),
            SessionStore::new(std::time::Duration::from_secs(60)),
            SecurityEventLog::disabled(),
            Metrics::new(),
        )
    }

    fn claims(sub: serde_json::Value) -> JwtClaims {
        JwtClaims { sub: Some(sub), user_id: None, exp: None }
    }

    #[test]
    fn test_actor_selection() {
        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        let verified = TokenStatus::Verified(claims(json!(42)));
        let forged = TokenStatus::Rejected { reason: TokenRejection::BadSignature, claims: Some(claims(json!("7"))) };
        let garbage = TokenStatus::Rejected { reason: TokenRejection::SegmentCount(1), claims: None };

        let trusting = gate(true);
        assert_eq!(trusting.actor(Some(&verified), ip), Actor::User("42".into()));
        assert_eq!(trusting.actor(Some(&forged), ip), Actor::User("7".into()));
        assert_eq!(trusting.actor(Some(&garbage), ip), Actor::Ip(ip));
        assert_eq!(trusting.actor(None, ip), Actor::Ip(ip));

        let strict = gate(false);
        assert_eq!(strict.actor(Some(&verified), ip), Actor::User("42".into()));
        assert_eq!(strict.actor(Some(&forged), ip), Actor::Ip(ip));

        let zero = TokenStatus::Verified(claims(json!("0")));
        assert_eq!(trusting.actor(Some(&zero), ip), Actor::Ip(ip));
    }

    #[tokio::test]
    async fn test_buffer_body_distinguishes_limit_from_stream_errors() {
        let bytes = buffer_body(Body::from("a=1"), 16).await.unwrap();
        assert_eq!(&bytes[..], b"a=1");

        let too_big = buffer_body(Body::from(vec![b'x'; 17]), 16).await;
        assert!(matches!(too_big, Err(AppError::PayloadTooLarge { limit: 16 })));

        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated"))];
        let broken = buffer_body(Body::from_stream(tokio_stream::iter(chunks)), 1024).await;
        assert!(matches!(broken, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_sanitize_query_rewrites_only_when_changed() {
        let mut uri: Uri = "/api/mentors/status?uid=+abc+&x=1".parse().unwrap();
        sanitize_query(&mut uri);
        assert_eq!(uri.path(), "/api/mentors/status");
        assert_eq!(uri.query(), Some("uid=abc&x=1"));

        let mut untouched: Uri = "/api/x?name=a%20b".parse().unwrap();
        sanitize_query(&mut untouched);
        assert_eq!(untouched.query(), Some("name=a%20b"));

        let mut bare: Uri = "/healthz".parse().unwrap();
        sanitize_query(&mut bare);
        assert_eq!(bare, "/healthz");
    }
}
