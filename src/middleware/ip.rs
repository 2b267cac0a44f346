use axum::http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr};

/// Proxy headers consulted for the client address, most trusted first.
const FORWARDING_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Extract client IP from proxy headers and optional transport metadata.
///
/// Each candidate is cut at the first comma and must parse as an IP; the first
/// valid one wins. Without any valid candidate the result is `0.0.0.0`.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    for name in FORWARDING_HEADERS {
        if let Some(ip) = headers.get(name).and_then(|hv| hv.to_str().ok()).and_then(parse_candidate) {
            return ip;
        }
    }
    if let Some(ip) = fallback {
        return ip;
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn parse_candidate(raw: &str) -> Option<IpAddr> {
    let first = raw.split(',').next()?.trim();
    if first.is_empty() {
        return None;
    }
    first.parse::<IpAddr>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.3"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.2, 172.16.0.1"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(extract_ip_from_headers(&headers, None), "10.0.0.1".parse::<IpAddr>().unwrap());

        headers.remove("cf-connecting-ip");
        assert_eq!(extract_ip_from_headers(&headers, None), "10.0.0.2".parse::<IpAddr>().unwrap());

        headers.remove("x-forwarded-for");
        assert_eq!(extract_ip_from_headers(&headers, None), "10.0.0.3".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_invalid_candidates_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(extract_ip_from_headers(&headers, None), "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_fallbacks() {
        let headers = HeaderMap::new();
        let remote: IpAddr = "192.168.1.20".parse().unwrap();
        assert_eq!(extract_ip_from_headers(&headers, Some(remote)), remote);
        assert_eq!(extract_ip_from_headers(&headers, None), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
