use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// The primary error type for the application.
///
/// Mentor endpoints render as `{"status":"error","message":...}`; the gate's
/// rejections keep their fixed wire bodies.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For failed credential checks.
    Unauthorized(String),
    /// For errors related to database operations. The detail is logged, never sent.
    Database(String),
    /// For when a dependency is temporarily unavailable.
    ServiceUnavailable(String),
    /// For bodies that exceed the gate's buffering limit.
    PayloadTooLarge { limit: usize },
    /// For when a client has sent too many requests in the current window.
    RateLimited {
        /// The window length in seconds, advertised in `Retry-After`.
        retry_after: u64,
    },
    /// For state-changing requests without a valid CSRF token or bearer token.
    CsrfRejected,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::PayloadTooLarge { limit } => write!(f, "Payload exceeds {} bytes", limit),
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate limited. Retry after {} seconds", retry_after)
            }
            AppError::CsrfRejected => write!(f, "CSRF token validation failed"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

fn status_body(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                status_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::BadRequest(msg) => status_body(StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => status_body(StatusCode::NOT_FOUND, msg),
            AppError::Unauthorized(msg) => status_body(StatusCode::UNAUTHORIZED, msg),
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                status_body(StatusCode::INTERNAL_SERVER_ERROR, "Query failed")
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                status_body(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable")
            }
            AppError::PayloadTooLarge { limit } => status_body(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds maximum size of {} bytes", limit),
            ),
            AppError::RateLimited { retry_after } => {
                let mut res = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "Rate limit exceeded",
                        "message": "Too many requests. Please try again later.",
                        "retry_after": retry_after,
                    })),
                )
                    .into_response();
                res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                res
            }
            AppError::CsrfRejected => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "CSRF token validation failed" })),
            )
                .into_response(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            sqlx::Error::Database(db_err) => AppError::Database(db_err.message().to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
