//! Visit metadata extraction from HTTP requests
//!
//! Pulls the client IP, user agent and referrer out of the request so the
//! redirect path can append a visit record. The IP honors the first entry of
//! `X-Forwarded-For` when present and falls back to the socket address.

use axum::http::{header, HeaderMap};
use std::net::SocketAddr;

/// Extract the client IP, preferring a forwarding proxy header.
pub fn client_ip(headers: &HeaderMap, socket_addr: SocketAddr) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    socket_addr.ip().to_string()
}

/// Raw User-Agent header, or "unknown" when missing or not valid UTF-8.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Referrer URL: the Referer header, falling back to Origin.
pub fn referrer(headers: &HeaderMap) -> Option<String> {
    for name in [header::REFERER, header::ORIGIN] {
        if let Some(value) = headers.get(&name).and_then(|value| value.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}
