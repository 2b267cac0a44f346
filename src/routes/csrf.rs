use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};

use crate::error::{AppError, AppResult};
use crate::middleware::validation::cookie_value;
use crate::state::AppState;
use crate::types::CsrfTokenResponse;

/// Issues the CSRF token for the caller's session, creating the session if needed.
pub async fn csrf_token(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let cookie_name = &state.config.security.session_cookie;
    let existing = cookie_value(&headers, cookie_name);
    let (session_id, csrf_token) = state.sessions.issue_csrf_token(existing.as_deref()).await;

    let cookie = HeaderValue::from_str(&format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, session_id))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid session cookie: {}", e)))?;

    Ok(([(header::SET_COOKIE, cookie)], Json(CsrfTokenResponse { csrf_token })))
}
