//! Strongly typed application update requests.
//!
//! # Defaults
//! - `id`: 0 (create a new application)
//! - `internal_scheme`: http
//! - `redirect_https`, `hsts_enabled`, `waf_enabled`, `csp_enabled`: false
//! - `csp`, `description`: empty string
//! - `ip_method`: remote_addr
//! - destination `id` / domain `id`: 0 (insert), `node_id`: 0
//!
//! `name` and every destination/domain string are required.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;
use crate::models::{Application, InternalScheme, IpMethod};

/// Desired state of an application, submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationUpdate {
    #[serde(default)]
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
    #[serde(default)]
    pub destinations: Vec<DestinationUpdate>,
    #[serde(default)]
    pub domains: Vec<DomainUpdate>,
}

/// Desired destination; `id == 0` means "create".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationUpdate {
    #[serde(default)]
    pub id: i64,
    pub destination: String,
    #[serde(default)]
    pub node_id: i64,
}

/// Desired domain; `id == 0` means "create".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainUpdate {
    #[serde(default)]
    pub id: i64,
    pub name: String,
}

impl ApplicationUpdate {
    /// An update with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
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

    /// Check every field, returning all problems found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.id < 0 {
            errors.push(ValidationError::new("id", "must not be negative"));
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "must not be empty"));
        }

        for (i, dest) in self.destinations.iter().enumerate() {
            let value = dest.destination.trim();
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                errors.push(ValidationError::new(
                    format!("destinations[{}].destination", i),
                    "must be a non-empty address without spaces",
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, domain) in self.domains.iter().enumerate() {
            let name = domain.name.trim().to_ascii_lowercase();
            if !is_valid_domain(&name) {
                errors.push(ValidationError::new(
                    format!("domains[{}].name", i),
                    format!("'{}' is not a host name or single-level wildcard", domain.name),
                ));
            } else if !seen.insert(name) {
                errors.push(ValidationError::new(
                    format!("domains[{}].name", i),
                    format!("'{}' is listed twice", domain.name),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Trim strings and lowercase domain names.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.csp = self.csp.trim().to_string();
        for dest in &mut self.destinations {
            dest.destination = dest.destination.trim().to_string();
        }
        for domain in &mut self.domains {
            domain.name = domain.name.trim().to_ascii_lowercase();
        }
        self
    }

    /// Scalar settings as an application with empty lists.
    pub fn settings(&self, id: i64) -> Application {
        Application {
            id,
            name: self.name.clone(),
            internal_scheme: self.internal_scheme,
            redirect_https: self.redirect_https,
            hsts_enabled: self.hsts_enabled,
            waf_enabled: self.waf_enabled,
            csp_enabled: self.csp_enabled,
            csp: self.csp.clone(),
            ip_method: self.ip_method,
            description: self.description.clone(),
            destinations: Vec::new(),
            domains: Vec::new(),
        }
    }
}

fn is_valid_domain(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 || name.chars().any(char::is_whitespace) {
        return false;
    }
    let rest = name.strip_prefix("*.").unwrap_or(name);
    !rest.is_empty()
        && !rest.contains('*')
        && !rest.contains(':')
        && !rest.contains('/')
        && !rest.starts_with('.')
        && !rest.ends_with('.')
        && !rest.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let update: ApplicationUpdate = serde_json::from_str(
            r#"{"name": "blog", "destinations": [{"destination": "10.0.0.2:80"}], "domains": [{"name": "Blog.Example.com"}]}"#,
        )
        .unwrap();
        assert_eq!(update.id, 0);
        assert_eq!(update.description, "");
        assert_eq!(update.destinations[0].node_id, 0);
        assert!(update.validate().is_ok());
        assert_eq!(update.normalized().domains[0].name, "blog.example.com");
    }

    #[test]
    fn test_missing_name_is_rejected_by_serde() {
        let result: Result<ApplicationUpdate, _> = serde_json::from_str(r#"{"id": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut update = ApplicationUpdate::new(" ");
        update.destinations.push(DestinationUpdate { id: 0, destination: "".into(), node_id: 0 });
        update.domains.push(DomainUpdate { id: 0, name: "a.*.example.com".into() });
        update.domains.push(DomainUpdate { id: 0, name: "ok.example.com".into() });
        update.domains.push(DomainUpdate { id: 0, name: "OK.example.com".into() });

        let errors = update.validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "destinations[0].destination", "domains[0].name", "domains[2].name"]);
    }

    #[test]
    fn test_domain_rules() {
        assert!(is_valid_domain("*.example.com"));
        assert!(is_valid_domain("localhost"));
        assert!(!is_valid_domain("*"));
        assert!(!is_valid_domain("**.example.com"));
        assert!(!is_valid_domain("example..com"));
        assert!(!is_valid_domain("example.com:8080"));
    }
}
