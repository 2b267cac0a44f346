//! Bearer token inspection.
//!
//! Tokens are externally issued HS256 JWTs. [`inspect_token`] is the single
//! decoding routine: rate-limit identification reads the subject from any
//! result that carries claims, CSRF exemption requires [`TokenStatus::Verified`].

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded token payload. Only the claims the gate relies on are modelled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<Value>,
}

impl JwtClaims {
    /// The subject: `sub`, or `user_id` when `sub` is absent.
    ///
    /// An empty string, `"0"` or zero identifies nobody; that does not fall
    /// through to `user_id`. Strings and numbers are accepted.
    pub fn subject(&self) -> Option<String> {
        match self.sub.as_ref().or(self.user_id.as_ref())? {
            Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `exp` in seconds since the epoch. Integers, fractions and numeric strings are read.
    pub fn expires_at(&self) -> Option<f64> {
        match self.exp.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_expired(&self, now: f64) -> bool {
        self.expires_at().is_some_and(|exp| exp < now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not three dot-separated segments.
    SegmentCount(usize),
    BadSignature,
    Expired,
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Verified(JwtClaims),
    /// `claims` holds the unverified payload when it could be decoded.
    Rejected { reason: TokenRejection, claims: Option<JwtClaims> },
}

impl TokenStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, TokenStatus::Verified(_))
    }

    pub fn claims(&self) -> Option<&JwtClaims> {
        match self {
            TokenStatus::Verified(claims) => Some(claims),
            TokenStatus::Rejected { claims, .. } => claims.as_ref(),
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>` (scheme case-insensitive).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, rest) = value.split_at_checked(6)?;
    if !scheme.eq_ignore_ascii_case("bearer") || !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let token = rest.trim_start();
    (!token.is_empty()).then_some(token)
}

/// Decodes the payload segment without checking the signature.
fn decode_unverified(payload: &str) -> Option<JwtClaims> {
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Checks the HS256 signature over `header.payload`, then the payload's `exp`.
///
/// The header is never consulted. A signed payload that is not a JSON object
/// verifies with empty claims.
pub fn inspect_token(token: &str, secret: &[u8]) -> TokenStatus {
    let segments: Vec<&str> = token.split('.').collect();
    let &[header, payload, signature] = segments.as_slice() else {
        return TokenStatus::Rejected { reason: TokenRejection::SegmentCount(segments.len()), claims: None };
    };
    let claims = decode_unverified(payload);

    let message = format!("{}.{}", header, payload);
    let reason = match jsonwebtoken::crypto::verify(
        signature,
        message.as_bytes(),
        &DecodingKey::from_secret(secret),
        Algorithm::HS256,
    ) {
        Ok(true) => {
            let now = chrono::Utc::now().timestamp() as f64;
            if !claims.as_ref().is_some_and(|c| c.is_expired(now)) {
                return TokenStatus::Verified(claims.unwrap_or_default());
            }
            TokenRejection::Expired
        }
        Ok(false) => TokenRejection::BadSignature,
        Err(e) => TokenRejection::Malformed(e.to_string()),
    };
    tracing::debug!(?reason, "Bearer token rejected");
    TokenStatus::Rejected { reason, claims }
}

/// Compares two byte strings in time independent of where they differ.
///
/// A length mismatch returns early; lengths are not secret here.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
