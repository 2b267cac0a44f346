//! Input sanitization and small validation helpers.
//!
//! Sanitizing strips NUL bytes and surrounding whitespace from values. Markup
//! is left alone; escaping belongs to whatever renders the value.

use axum::http::{header, HeaderMap, HeaderValue};
use serde_json::Value;

/// Request body encodings the gate can rewrite in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Form,
    Json,
    Other,
}

impl BodyKind {
    pub fn detect(headers: &HeaderMap) -> Self {
        let ct = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();
        if ct.starts_with("application/x-www-form-urlencoded") {
            BodyKind::Form
        } else if ct.starts_with("application/json") {
            BodyKind::Json
        } else {
            BodyKind::Other
        }
    }

    pub fn is_buffered(self) -> bool {
        self != BodyKind::Other
    }
}

pub fn sanitize_str(input: &str) -> String {
    input.replace('\0', "").trim().to_string()
}

/// Sanitizes every string inside a JSON value; returns true if anything changed.
pub fn sanitize_json(value: &mut Value) -> bool {
    match value {
        Value::String(s) => {
            let cleaned = sanitize_str(s);
            if cleaned != *s {
                *s = cleaned;
                true
            } else {
                false
            }
        }
        Value::Array(items) => items.iter_mut().fold(false, |changed, v| sanitize_json(v) | changed),
        Value::Object(map) => map.values_mut().fold(false, |changed, v| sanitize_json(v) | changed),
        _ => false,
    }
}

/// Sanitizes the values of an `application/x-www-form-urlencoded` string.
///
/// Returns `None` when no value changed so the caller can keep the original bytes.
pub fn sanitize_form(encoded: &[u8]) -> Option<String> {
    let mut changed = false;
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(encoded)
        .map(|(k, v)| {
            let cleaned = sanitize_str(&v);
            changed |= cleaned != v;
            (k.into_owned(), cleaned)
        })
        .collect();
    if !changed {
        return None;
    }
    Some(url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish())
}

/// Looks up a single field of a form body.
pub fn form_field(encoded: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded).find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

/// Rewrites a body of the given kind; `None` means keep the original bytes.
pub fn sanitize_body(kind: BodyKind, body: &[u8]) -> Option<Vec<u8>> {
    match kind {
        BodyKind::Form => sanitize_form(body).map(String::into_bytes),
        BodyKind::Json => {
            let mut value: Value = serde_json::from_slice(body).ok()?;
            if sanitize_json(&mut value) {
                serde_json::to_vec(&value).ok()
            } else {
                None
            }
        }
        BodyKind::Other => None,
    }
}

/// Trims every cookie value in place.
pub fn sanitize_cookies(headers: &mut HeaderMap) {
    let rewritten: Vec<HeaderValue> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .map(|raw| {
            raw.split(';')
                .filter_map(|pair| {
                    let (name, value) = pair.split_once('=')?;
                    Some(format!("{}={}", name.trim(), sanitize_str(value)))
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter_map(|joined| HeaderValue::from_str(&joined).ok())
        .collect();
    if rewritten.is_empty() {
        return;
    }
    headers.remove(header::COOKIE);
    for value in rewritten {
        headers.append(header::COOKIE, value);
    }
}

/// Returns the named cookie's value, if present.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().to_string())
}

/// Sanitizes user input for logging purposes.
///
/// This function removes control characters, limits the length of the string,
/// and escapes special characters.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}
