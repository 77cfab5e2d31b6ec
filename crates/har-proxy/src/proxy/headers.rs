//! Hop-by-hop header handling.
//!
//! Hop-by-hop headers describe a single connection and are removed before a
//! message is passed on, in both directions.

use hyper::header::{
    HeaderName, CONNECTION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
    TRANSFER_ENCODING, UPGRADE,
};
use hyper::HeaderMap;

const HOP_BY_HOP: [HeaderName; 9] = [
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    HeaderName::from_static("proxy-connection"),
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_standard_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("proxy-connection", "keep-alive".parse().unwrap());
        headers.insert("proxy-authorization", "Basic Zm9vOmJhcg==".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());
        headers.insert("host", "example.com".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key("content-type"));
        assert!(headers.contains_key("host"));
    }

    #[test]
    fn test_strips_headers_named_by_connection() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "close, x-session-hint".parse().unwrap());
        headers.insert("x-session-hint", "abc".parse().unwrap());
        headers.insert("x-kept", "1".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key("x-session-hint"));
        assert!(!headers.contains_key("connection"));
        assert_eq!(headers.get("x-kept").unwrap(), "1");
    }
}
