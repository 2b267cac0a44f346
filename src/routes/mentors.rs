use axum::{
    extract::{rejection::FormRejection, State},
    http::{Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;

use super::{client_ip, user_agent};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::middleware::validation::sanitize_for_logging;
use crate::security::{hash_password, verify_stored_password, PasswordMatch, SecurityEvent};
use crate::state::AppState;
use crate::types::{LoginForm, LoginResponse, StatusForm, StatusResponse};

/// Mentor login with e-mail and password.
///
/// A body that is not a form counts as missing fields.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<Json<LoginResponse>> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let email = form.email.trim();
    let password = form.password.trim();

    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Email dan password harus diisi".into()));
    }

    let ip = client_ip(&headers, &extensions);
    let ua = user_agent(&headers);
    let failed = |reason: &str| {
        state.metrics.inc_logins_failed();
        state.events.record(
            SecurityEvent::new("login_failed", Some(ip), ua)
                .detail("email", sanitize_for_logging(email))
                .detail("reason", reason),
        );
    };

    let Some(mentor) = db::find_mentor_by_email(&state.db, email).await? else {
        failed("unknown_email");
        return Err(AppError::NotFound("Email tidak terdaftar".into()));
    };

    let stored = mentor.password.clone().unwrap_or_default();
    let candidate = password.to_string();
    let matched = tokio::task::spawn_blocking(move || verify_stored_password(&candidate, &stored))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password verification task failed: {}", e)))?;

    let Some(matched) = matched else {
        failed("wrong_password");
        return Err(AppError::Unauthorized("Password salah".into()));
    };

    if matched != PasswordMatch::Hashed && state.config.security.rehash_legacy_passwords {
        upgrade_password(&state, mentor.id, password, matched).await;
    }

    let verified = mentor.verified_by_precedence();
    state.metrics.inc_logins_succeeded();
    state.events.record(
        SecurityEvent::new("login_success", Some(ip), ua)
            .detail("email", sanitize_for_logging(email))
            .detail("verified", verified),
    );

    Ok(Json(LoginResponse {
        status: "success".into(),
        message: "Login berhasil".into(),
        verified,
        mentor_data: mentor.login_data(verified),
    }))
}

/// Replaces a legacy stored password with a hash. Failures only log; the login already succeeded.
async fn upgrade_password(state: &AppState, id: i64, password: &str, from: PasswordMatch) {
    let algorithm = state.config.security.password_algorithm;
    let password = password.to_string();
    let hashed = match tokio::task::spawn_blocking(move || hash_password(&password, algorithm)).await {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            tracing::warn!("Failed to hash legacy password for mentor {}: {}", id, e);
            return;
        }
        Err(e) => {
            tracing::warn!("Password hashing task failed: {}", e);
            return;
        }
    };
    match db::update_mentor_password(&state.db, id, &hashed).await {
        Ok(()) => tracing::info!(mentor_id = id, ?from, ?algorithm, "Upgraded legacy password"),
        Err(e) => tracing::warn!("Failed to store upgraded password for mentor {}: {}", id, e),
    }
}

/// Verification status by uid (app or Firebase) or e-mail.
pub async fn status(
    State(state): State<AppState>,
    form: Result<Form<StatusForm>, FormRejection>,
) -> AppResult<Response> {
    let form = form.map(|Form(f)| f).unwrap_or_default();
    let uid = form.uid.trim();
    let email = form.email.trim();

    if uid.is_empty() && email.is_empty() {
        return Err(AppError::BadRequest("UID or email required".into()));
    }
    state.metrics.inc_status_checks();

    let mentor = if !uid.is_empty() {
        db::find_mentor_by_uid(&state.db, uid).await?
    } else {
        db::find_mentor_by_email(&state.db, email).await?
    };

    let Some(mentor) = mentor else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "verified": false, "message": "Mentor not found" })),
        )
            .into_response());
    };

    Ok(Json(StatusResponse {
        status: "success".into(),
        verified: mentor.verified_by_any(),
        mentor_data: mentor.status_data(uid),
    })
    .into_response())
}
