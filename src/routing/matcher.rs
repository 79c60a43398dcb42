//! Host matching helpers.
//!
//! # Design Decisions
//! - Host matching is case-insensitive
//! - The port in a `Host` header never takes part in matching
//! - No regex to keep lookups O(1)

/// Normalize a `Host` header value for lookup: lowercase, port and trailing
/// dot removed. IPv6 literals keep their brackets.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        }
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// Wildcard form of a host: everything before the first `.` replaced by `*`.
///
/// `app.example.com` → `*.example.com`. Hosts without a dot, or starting with
/// one, have no wildcard form.
pub fn wildcard_of(host: &str) -> Option<String> {
    match host.find('.') {
        Some(index) if index > 0 => Some(format!("*{}", &host[index..])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("Example.COM"), "example.com");
        assert_eq!(normalize_host("example.com:8080"), "example.com");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:443"), "[::1]");
        assert_eq!(normalize_host("localhost"), "localhost");
    }

    #[test]
    fn test_wildcard_of() {
        assert_eq!(wildcard_of("app.example.com").as_deref(), Some("*.example.com"));
        assert_eq!(wildcard_of("a.b.example.com").as_deref(), Some("*.b.example.com"));
        assert_eq!(wildcard_of("localhost"), None);
        assert_eq!(wildcard_of(".example.com"), None);
    }
}
