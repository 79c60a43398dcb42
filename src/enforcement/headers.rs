//! Header rewriting stages.

use std::sync::OnceLock;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use regex::Regex;
use url::Url;

use crate::http::request::ClientTransport;

pub const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains";

const X_POWERED_BY: &str = "x-powered-by";

fn secure_attribute() -> Option<&'static Regex> {
    static SECURE: OnceLock<Option<Regex>> = OnceLock::new();
    SECURE.get_or_init(|| Regex::new(r"(?i);\s*secure\b").ok()).as_ref()
}

/// Point absolute redirects on non-standard ports at the client-facing
/// scheme. Host, port, path and query are kept verbatim.
pub fn rewrite_location(headers: &mut HeaderMap, transport: ClientTransport) {
    let Some(raw) = headers.get(header::LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };
    let Ok(url) = Url::parse(raw) else {
        return;
    };
    if url.scheme() != "http" && url.scheme() != "https" {
        return;
    }
    match url.port_or_known_default() {
        Some(80) | Some(443) | None => return,
        Some(_) => {}
    }
    let Some((scheme, rest)) = raw.split_once(':') else {
        return;
    };
    if scheme.eq_ignore_ascii_case(transport.scheme()) {
        return;
    }

    let rewritten = format!("{}:{}", transport.scheme(), rest);
    if let Ok(value) = HeaderValue::from_str(&rewritten) {
        tracing::debug!(from = %raw, to = %rewritten, "Location rewritten");
        headers.insert(header::LOCATION, value);
    }
}

/// Replace an existing `X-Powered-By` with the product name.
pub fn hide_powered_by(headers: &mut HeaderMap, product_name: &HeaderValue) {
    if headers.contains_key(X_POWERED_BY) {
        headers.insert(X_POWERED_BY, product_name.clone());
    }
}

pub fn apply_hsts(headers: &mut HeaderMap) {
    headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS_VALUE));
}

pub fn apply_csp(headers: &mut HeaderMap, csp: &str) {
    match HeaderValue::from_str(csp) {
        Ok(value) => {
            headers.insert(header::CONTENT_SECURITY_POLICY, value);
        }
        Err(_) => tracing::warn!("Configured CSP is not a valid header value, skipped"),
    }
}

/// Adjust headers for a plain-HTTP client talking to an https backend.
pub fn downgrade(headers: &mut HeaderMap) {
    if let Some(secure) = secure_attribute() {
        rewrite_all(headers, header::SET_COOKIE, |v| secure.replace_all(v, "").into_owned());
    }
    rewrite_all(headers, header::ACCESS_CONTROL_ALLOW_ORIGIN, |v| v.replacen("https", "http", 1));
    rewrite_all(headers, header::CONTENT_SECURITY_POLICY, |v| v.replace("https", "http"));
}

fn rewrite_all(headers: &mut HeaderMap, name: HeaderName, f: impl Fn(&str) -> String) {
    if !headers.contains_key(&name) {
        return;
    }
    let rewritten: Vec<HeaderValue> = headers
        .get_all(&name)
        .iter()
        .map(|value| match value.to_str() {
            Ok(text) => HeaderValue::from_str(&f(text)).unwrap_or_else(|_| value.clone()),
            Err(_) => value.clone(),
        })
        .collect();

    headers.remove(&name);
    for value in rewritten {
        headers.append(name.clone(), value);
    }
}
