//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::models::PolicyAction;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Connection settings towards backends.
    pub upstream: UpstreamConfig,

    /// Enforcement behaviour (product name, CAPTCHA, selection).
    pub gateway: EnforcementConfig,

    /// Static resource edge cache.
    pub cache: CacheConfig,

    /// Response policy rules and static resource classification.
    pub waf: WafConfig,

    /// Policy hit audit log.
    pub audit: AuditConfig,

    /// Master/replica mode.
    pub cluster: ClusterConfig,

    /// Persistent application store.
    pub store: StoreConfig,

    /// Admin and replication API.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Plain HTTP bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS listener.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// TLS bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream (backend) connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body forwarded to a backend, in bytes.
    pub max_body_size: usize,

    /// Accept self-signed certificates on https backends.
    pub accept_invalid_certs: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_body_size: 10 * 1024 * 1024,
            accept_invalid_certs: true,
        }
    }
}

/// Destination selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    #[default]
    Clock,
    RoundRobin,
}

/// Enforcement behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Replaces backend `X-Powered-By` values.
    pub product_name: String,

    /// Path CAPTCHA redirects point to; `?id=<client id>` is appended.
    pub captcha_entrance: String,

    /// Lifetime of a pending CAPTCHA challenge in seconds.
    pub captcha_ttl_secs: u64,

    /// Interval of the expired-challenge sweep in seconds.
    pub captcha_sweep_secs: u64,

    /// Destination selection strategy.
    pub selection: SelectionStrategy,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            product_name: crate::PRODUCT_NAME.to_string(),
            captcha_entrance: "/captcha/challenge".to_string(),
            captcha_ttl_secs: 600,
            captcha_sweep_secs: 60,
            selection: SelectionStrategy::Clock,
        }
    }
}

/// Static resource cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Root directory; one subtree per application ID.
    pub root: String,

    /// Responses larger than this (or of unknown size) are never cached.
    pub max_object_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: "./static/cdncache".to_string(),
            max_object_bytes: 10 * 1024 * 1024,
        }
    }
}

/// WAF response rules and static resource classification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WafConfig {
    /// Path extensions (without dot, case-insensitive) treated as static.
    pub static_extensions: Vec<String>,

    /// Response inspection rules, checked in order.
    pub response_rules: Vec<ResponseRuleConfig>,
}

impl Default for WafConfig {
    fn default() -> Self {
        let extensions = [
            "js", "css", "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp", "woff", "woff2", "ttf",
            "eot", "otf", "mp3", "mp4", "swf", "txt",
        ];
        Self {
            static_extensions: extensions.iter().map(|e| e.to_string()).collect(),
            response_rules: Vec::new(),
        }
    }
}

/// A single response inspection rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseRuleConfig {
    /// Policy ID reported on hit.
    pub policy_id: i64,

    /// Restrict to one application (absent = all).
    #[serde(default)]
    pub app_id: Option<i64>,

    /// Human readable reason shown on the block page.
    #[serde(default = "default_vuln_name")]
    pub vuln_name: String,

    pub action: PolicyAction,

    /// Only match responses with this status.
    #[serde(default)]
    pub status: Option<u16>,

    /// Response header inspected by `pattern`; absent = the status code.
    #[serde(default)]
    pub header: Option<String>,

    /// Regular expression.
    pub pattern: String,
}

fn default_vuln_name() -> String {
    "Response Policy Hit".to_string()
}

/// Policy hit audit log.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines output file; absent logs hits through tracing only.
    pub path: Option<String>,

    /// Buffered hits before new ones are dropped.
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            channel_capacity: 4096,
        }
    }
}

/// Role of this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    #[default]
    Master,
    Replica,
}

/// Cluster configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub role: NodeRole,

    /// Master admin base URL (replicas only), e.g. "http://10.0.0.1:8081".
    pub master_url: Option<String>,

    /// Replica refresh interval in seconds.
    pub sync_interval_secs: u64,

    /// Base delay for exponential backoff after a failed sync, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::Master,
            master_url: None,
            sync_interval_secs: 60,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Application store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON data file; absent keeps everything in memory.
    pub data_path: Option<String>,

    /// Reload the registry when the data file changes on disk.
    pub watch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: Some("./data/applications.json".to_string()),
            watch: false,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token). Replicas use it too.
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
