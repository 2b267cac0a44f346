//! Security and CORS response headers.
//!
//! The gate computes these into a [`HeaderMap`] before any check runs and merges
//! them into whatever response the request ends with, terminal or not.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CACHE_CONTROL, ORIGIN, PRAGMA,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self' data:; connect-src 'self'; frame-ancestors 'none';";

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

/// Adds the fixed security headers.
///
/// `uri` is the request path plus query; responses under `/api/` are marked
/// uncacheable.
///
/// # Security Headers Applied
///
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `X-XSS-Protection: 1; mode=block`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy` (see [`CONTENT_SECURITY_POLICY`])
/// - `Permissions-Policy: geolocation=(), microphone=(), camera=()`
/// - Optional: `Strict-Transport-Security` when `enable_hsts` is set
pub fn apply_security_headers(headers: &mut HeaderMap, uri: &str, enable_hsts: bool) {
    headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    headers.insert(HeaderName::from_static("x-xss-protection"), HeaderValue::from_static("1; mode=block"));
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    if enable_hsts {
        headers.insert(HeaderName::from_static("strict-transport-security"), HeaderValue::from_static(HSTS_VALUE));
    }

    if uri.contains("/api/") {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }
}

/// Echoes the request origin with CORS headers when it is on the allow-list.
///
/// Matching is exact; returns whether headers were attached.
pub fn apply_cors_headers(headers: &mut HeaderMap, request_headers: &HeaderMap, allowed: &[String]) -> bool {
    let Some(origin) = request_headers.get(ORIGIN) else {
        return false;
    };
    let Ok(origin_str) = origin.to_str() else {
        return false;
    };
    if !allowed.iter().any(|a| a == origin_str) {
        return false;
    }

    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origins() -> Vec<String> {
        vec!["http://localhost:8080".to_string(), "https://mentorly.id".to_string()]
    }

    #[test]
    fn test_fixed_headers() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, "/healthz", false);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(headers["content-security-policy"], CONTENT_SECURITY_POLICY);
        assert_eq!(headers["permissions-policy"], "geolocation=(), microphone=(), camera=()");
        assert!(!headers.contains_key(CACHE_CONTROL));
        assert!(!headers.contains_key("strict-transport-security"));
    }

    #[test]
    fn test_api_paths_are_uncacheable() {
        let mut headers = HeaderMap::new();
        apply_security_headers(&mut headers, "/api/mentors/status", true);
        assert_eq!(headers[CACHE_CONTROL], "no-store, no-cache, must-revalidate, max-age=0");
        assert_eq!(headers[PRAGMA], "no-cache");
        assert_eq!(headers["strict-transport-security"], HSTS_VALUE);
    }

    #[test]
    fn test_cors_exact_match_only() {
        let allowed = origins();
        for (origin, expect) in [
            ("http://localhost:8080", true),
            ("https://mentorly.id", true),
            ("http://localhost:8080/", false),
            ("https://mentorly.id.evil.com", false),
            ("HTTPS://MENTORLY.ID", false),
            ("", false),
        ] {
            let mut req = HeaderMap::new();
            req.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
            let mut headers = HeaderMap::new();
            assert_eq!(apply_cors_headers(&mut headers, &req, &allowed), expect, "origin {:?}", origin);
            assert_eq!(headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN), expect);
            if expect {
                assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], origin);
                assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
                assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "86400");
            }
        }
    }

    #[test]
    fn test_cors_without_origin() {
        let mut headers = HeaderMap::new();
        assert!(!apply_cors_headers(&mut headers, &HeaderMap::new(), &origins()));
        assert!(headers.is_empty());
    }
}
