//! Inbound request context.
//!
//! # Responsibilities
//! - Capture the request line, host and headers before the body is consumed
//! - Record which listener (plain or TLS) accepted the connection
//! - Strip hop-by-hop headers before forwarding
//!
//! # Design Decisions
//! - The context is cloned out of the request once; enforcement stages only
//!   read it
//! - The transport is an axum `Extension`, set per listener

use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderMap, HeaderName, Method, Uri};

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Listener that accepted the client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientTransport {
    #[default]
    Plain,
    Tls,
}

impl ClientTransport {
    pub fn scheme(&self) -> &'static str {
        match self {
            ClientTransport::Plain => "http",
            ClientTransport::Tls => "https",
        }
    }
}

/// Read-only view of the client request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    /// `Host` header (or URI authority), as sent by the client.
    pub host: String,
    pub headers: HeaderMap,
    pub transport: ClientTransport,
    pub peer: SocketAddr,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, transport: ClientTransport, peer: SocketAddr) -> Self {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            host,
            headers: parts.headers.clone(),
            transport,
            peer,
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus `?query` when a query is present.
    pub fn target_url(&self) -> String {
        match self.uri.query() {
            Some(query) => format!("{}?{}", self.uri.path(), query),
            None => self.uri.path().to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT.as_str()).unwrap_or("")
    }

    pub fn request_id(&self) -> &str {
        self.header(X_REQUEST_ID).unwrap_or("unknown")
    }

    pub fn is_tls(&self) -> bool {
        self.transport == ClientTransport::Tls
    }
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove connection-scoped headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn context(uri: &str) -> RequestContext {
        let (parts, _) = Request::builder()
            .uri(uri)
            .header("host", "Shop.Example.com:8080")
            .header("user-agent", "curl/8.0")
            .body(())
            .unwrap()
            .into_parts();
        RequestContext::from_parts(&parts, ClientTransport::Plain, "10.1.1.1:5000".parse().unwrap())
    }

    #[test]
    fn test_target_url() {
        assert_eq!(context("/cart?item=3").target_url(), "/cart?item=3");
        assert_eq!(context("/cart").target_url(), "/cart");
    }

    #[test]
    fn test_host_and_agent() {
        let ctx = context("/");
        assert_eq!(ctx.host, "Shop.Example.com:8080");
        assert_eq!(ctx.user_agent(), "curl/8.0");
        assert!(!ctx.is_tls());
        assert_eq!(ClientTransport::Tls.scheme(), "https");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "close, x-session-hint".parse().unwrap());
        headers.insert("x-session-hint", "1".parse().unwrap());
        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
