//! Real client IP derivation.

use std::net::IpAddr;

use crate::http::request::RequestContext;
use crate::models::IpMethod;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Client IP per the application's `ip_method`. Header methods fall back to
/// the socket peer when the header is missing or unparsable.
pub fn client_ip(request: &RequestContext, method: IpMethod) -> IpAddr {
    let from_headers = match method {
        IpMethod::RemoteAddr => None,
        IpMethod::XForwardedFor => forwarded_for(request),
        IpMethod::XRealIp => real_ip(request),
        IpMethod::RealIp => real_ip(request).or_else(|| forwarded_for(request)),
    };
    from_headers.unwrap_or_else(|| request.peer.ip())
}

fn forwarded_for(request: &RequestContext) -> Option<IpAddr> {
    request
        .header(X_FORWARDED_FOR)?
        .split(',')
        .next()
        .and_then(|first| first.trim().parse().ok())
}

fn real_ip(request: &RequestContext) -> Option<IpAddr> {
    request.header(X_REAL_IP)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::ClientTransport;
    use axum::http::Request;

    fn request(headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        RequestContext::from_parts(&parts, ClientTransport::Plain, "192.0.2.10:4000".parse().unwrap())
    }

    #[test]
    fn test_remote_addr_ignores_headers() {
        let req = request(&[("x-forwarded-for", "203.0.113.5")]);
        assert_eq!(client_ip(&req, IpMethod::RemoteAddr).to_string(), "192.0.2.10");
    }

    #[test]
    fn test_forwarded_for_takes_first() {
        let req = request(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1")]);
        assert_eq!(client_ip(&req, IpMethod::XForwardedFor).to_string(), "203.0.113.5");
    }

    #[test]
    fn test_real_ip_chain() {
        let req = request(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(client_ip(&req, IpMethod::RealIp).to_string(), "203.0.113.7");

        let req = request(&[("x-real-ip", "198.51.100.3"), ("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(client_ip(&req, IpMethod::RealIp).to_string(), "198.51.100.3");
    }

    #[test]
    fn test_garbage_falls_back_to_peer() {
        let req = request(&[("x-real-ip", "not-an-ip")]);
        assert_eq!(client_ip(&req, IpMethod::XRealIp).to_string(), "192.0.2.10");
    }
}
