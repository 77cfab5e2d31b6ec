//! Best-effort server address lookup for HAR entries.

use hyper::Uri;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve the address of the server a request went to.
///
/// Literal addresses are used as-is, names take the first IPv4 result of a
/// forward lookup. Any failure yields an empty string.
pub async fn resolve_server_ip(uri: &Uri) -> String {
    let Some(host) = uri.host() else {
        return String::new();
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.to_string();
    }

    let port = uri.port_u16().unwrap_or(80);
    match tokio::time::timeout(LOOKUP_TIMEOUT, tokio::net::lookup_host((host, port))).await {
        Ok(Ok(mut addrs)) => match addrs.find(|addr| addr.is_ipv4()) {
            Some(addr) => addr.ip().to_string(),
            None => {
                debug!("No IPv4 address for {}", host);
                String::new()
            }
        },
        Ok(Err(e)) => {
            debug!("Lookup of {} failed: {}", host, e);
            String::new()
        }
        Err(_) => {
            debug!("Lookup of {} timed out", host);
            String::new()
        }
    }
}
