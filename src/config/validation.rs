//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, sizes > 0)
//! - Check mode-dependent fields (replicas need a master URL)
//! - Compile rule patterns once to reject bad regexes early
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use regex::Regex;

use crate::config::schema::{GatewayConfig, NodeRole};

/// Largest static object the edge cache may store.
pub const MAX_CACHE_OBJECT_BYTES: u64 = 10 * 1024 * 1024;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(tls) = &config.listener.tls {
        check_addr(&mut errors, "listener.tls.bind_address", &tls.bind_address);
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0"));
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_secs", "must be greater than 0"));
    }

    if !config.gateway.captcha_entrance.starts_with('/') {
        errors.push(ValidationError::new("gateway.captcha_entrance", "must be an absolute path"));
    }
    if config.gateway.captcha_ttl_secs == 0 {
        errors.push(ValidationError::new("gateway.captcha_ttl_secs", "must be greater than 0"));
    }
    if config.gateway.captcha_sweep_secs == 0 {
        errors.push(ValidationError::new("gateway.captcha_sweep_secs", "must be greater than 0"));
    }

    if config.cache.enabled && config.cache.root.trim().is_empty() {
        errors.push(ValidationError::new("cache.root", "must not be empty when caching is enabled"));
    }
    if config.cache.max_object_bytes == 0 || config.cache.max_object_bytes > MAX_CACHE_OBJECT_BYTES {
        errors.push(ValidationError::new(
            "cache.max_object_bytes",
            format!("must be between 1 and {} bytes", MAX_CACHE_OBJECT_BYTES),
        ));
    }

    if config.audit.channel_capacity == 0 {
        errors.push(ValidationError::new("audit.channel_capacity", "must be greater than 0"));
    }

    for (i, rule) in config.waf.response_rules.iter().enumerate() {
        if let Err(e) = Regex::new(&rule.pattern) {
            errors.push(ValidationError::new(
                format!("waf.response_rules[{}].pattern", i),
                format!("invalid regex: {}", e),
            ));
        }
    }

    if config.cluster.role == NodeRole::Replica {
        match &config.cluster.master_url {
            Some(url) if url::Url::parse(url).is_ok() => {}
            Some(_) => errors.push(ValidationError::new("cluster.master_url", "must be a valid URL")),
            None => errors.push(ValidationError::new("cluster.master_url", "required when role = replica")),
        }
        if config.cluster.sync_interval_secs == 0 {
            errors.push(ValidationError::new("cluster.sync_interval_secs", "must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}
