//! Cross-Site Request Forgery (CSRF) protection.
//!
//! State-changing requests must echo the token pinned to their session, either
//! in the CSRF header or in the form field. Requests carrying a verified
//! bearer token are stateless and skip the check.

use axum::http::{HeaderMap, Method};

use super::auth::{constant_time_eq, TokenStatus};
use super::validation::cookie_value;
use crate::config::SecurityConfig;
use crate::session::SessionStore;

/// Methods that modify state and therefore need a CSRF token.
pub fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

/// Whether a request is exempt because it carries a verified bearer token.
pub fn is_token_exempt(token: Option<&TokenStatus>) -> bool {
    token.is_some_and(TokenStatus::is_verified)
}

#[derive(Clone)]
pub struct CsrfGuard {
    sessions: SessionStore,
    header_name: String,
    field_name: String,
    cookie_name: String,
}

impl CsrfGuard {
    pub fn new(sessions: SessionStore, cfg: &SecurityConfig) -> Self {
        Self {
            sessions,
            header_name: cfg.csrf_header.clone(),
            field_name: cfg.csrf_field.clone(),
            cookie_name: cfg.session_cookie.clone(),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Picks the submitted token: the header wins over the form field.
    pub fn submitted_token(&self, headers: &HeaderMap, form_field: Option<String>) -> String {
        match headers.get(self.header_name.as_str()) {
            Some(v) => v.to_str().unwrap_or_default().to_string(),
            None => form_field.unwrap_or_default(),
        }
    }

    /// Validates the CSRF token in the request headers or form body.
    ///
    /// An absent session, an empty session token or any mismatch fails.
    pub async fn validate(&self, headers: &HeaderMap, form_field: Option<String>) -> bool {
        let submitted = self.submitted_token(headers, form_field);
        let Some(session_id) = cookie_value(headers, &self.cookie_name) else {
            return false;
        };
        let Some(expected) = self.sessions.csrf_token(&session_id).await else {
            return false;
        };
        !expected.is_empty() && constant_time_eq(expected.as_bytes(), submitted.as_bytes())
    }
}
