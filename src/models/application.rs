//! Applications and the backends/domains attached to them.

use serde::{Deserialize, Serialize};

/// Scheme used to reach an application's backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalScheme {
    #[default]
    Http,
    Https,
}

impl InternalScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternalScheme::Http => "http",
            InternalScheme::Https => "https",
        }
    }
}

impl std::fmt::Display for InternalScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the real client IP is derived for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IpMethod {
    /// Socket peer address.
    #[default]
    RemoteAddr,
    /// First entry of `X-Forwarded-For`.
    XForwardedFor,
    /// `X-Real-IP`.
    XRealIp,
    /// `X-Real-IP`, then `X-Forwarded-For`, then the peer address.
    RealIp,
}

impl IpMethod {
    /// Legacy numeric code.
    pub fn code(&self) -> u8 {
        match self {
            IpMethod::RemoteAddr => 1,
            IpMethod::XForwardedFor => 2,
            IpMethod::XRealIp => 3,
            IpMethod::RealIp => 4,
        }
    }
}

/// A backend target for an application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Destination {
    pub id: i64,
    pub app_id: i64,
    /// Backend address, e.g. `10.0.0.5:8080`.
    pub destination: String,
    /// Cluster node serving this destination.
    #[serde(default)]
    pub node_id: i64,
}

/// A host name (or `*.suffix` wildcard) routed to an application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Domain {
    pub id: i64,
    pub app_id: i64,
    pub name: String,
}

impl Domain {
    pub fn is_wildcard(&self) -> bool {
        self.name.starts_with("*.")
    }
}

/// A protected backend web application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub internal_scheme: InternalScheme,
    #[serde(default)]
    pub redirect_https: bool,
    #[serde(default)]
    pub hsts_enabled: bool,
    #[serde(default)]
    pub waf_enabled: bool,
    #[serde(default)]
    pub csp_enabled: bool,
    #[serde(default)]
    pub csp: String,
    #[serde(default)]
    pub ip_method: IpMethod,
    #[serde(default)]
    pub description: String,
    /// Insertion ordered; empty means "no backend".
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

impl Application {
    /// An application with default settings and no backends or domains.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            internal_scheme: InternalScheme::Http,
            redirect_https: false,
            hsts_enabled: false,
            waf_enabled: false,
            csp_enabled: false,
            csp: String::new(),
            ip_method: IpMethod::RemoteAddr,
            description: String::new(),
            destinations: Vec::new(),
            domains: Vec::new(),
        }
    }

    /// Copy of the scalar settings with destinations and domains cleared.
    ///
    /// This is the shape persisted in the application table.
    pub fn settings_only(&self) -> Self {
        Self {
            destinations: Vec::new(),
            domains: Vec::new(),
            ..self.clone()
        }
    }

    /// The content-security-policy to inject, if any.
    pub fn content_security_policy(&self) -> Option<&str> {
        if self.csp_enabled && !self.csp.trim().is_empty() {
            Some(self.csp.as_str())
        } else {
            None
        }
    }
}
