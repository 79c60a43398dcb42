//! Host → Application lookup table.
//!
//! # Responsibilities
//! - Store compiled domain mappings
//! - Resolve a host with exact-then-wildcard semantics
//! - Return matched application or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - One mapping per name; a later application claiming the same name wins

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Application;
use crate::routing::matcher::{normalize_host, wildcard_of};

/// Immutable domain routing table.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: HashMap<String, Arc<Application>>,
}

impl RoutingTable {
    /// Build a table from the domains of `apps`, in order.
    pub fn build(apps: &[Arc<Application>]) -> Self {
        let mut entries: HashMap<String, Arc<Application>> = HashMap::new();
        for app in apps {
            for domain in &app.domains {
                let name = domain.name.to_ascii_lowercase();
                if let Some(previous) = entries.insert(name, app.clone()) {
                    if previous.id != app.id {
                        tracing::warn!(
                            domain = %domain.name,
                            previous_app = previous.id,
                            app = app.id,
                            "Domain claimed by more than one application, keeping the latest"
                        );
                    }
                }
            }
        }
        Self { entries }
    }

    /// Resolve a host (raw `Host` header value accepted).
    pub fn resolve(&self, host: &str) -> Option<Arc<Application>> {
        let host = normalize_host(host);
        if let Some(app) = self.entries.get(&host) {
            return Some(app.clone());
        }
        let wildcard = wildcard_of(&host)?;
        self.entries.get(&wildcard).cloned()
    }

    /// Number of domain names mapped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Domain;

    fn app(id: i64, domains: &[&str]) -> Arc<Application> {
        let mut app = Application::new(id, format!("app-{}", id));
        app.domains = domains
            .iter()
            .enumerate()
            .map(|(i, name)| Domain { id: id * 100 + i as i64, app_id: id, name: name.to_string() })
            .collect();
        Arc::new(app)
    }

    #[test]
    fn test_exact_match() {
        let table = RoutingTable::build(&[app(1, &["www.example.com"])]);
        assert_eq!(table.resolve("www.example.com").unwrap().id, 1);
        assert_eq!(table.resolve("WWW.example.com:8080").unwrap().id, 1);
        assert!(table.resolve("api.example.com").is_none());
    }

    #[test]
    fn test_wildcard_fallback() {
        let table = RoutingTable::build(&[app(1, &["*.example.com"])]);
        assert_eq!(table.resolve("app.example.com").unwrap().id, 1);
        assert!(table.resolve("example.com").is_none());
        // Single level only.
        assert!(table.resolve("a.b.example.com").is_none());
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let table = RoutingTable::build(&[app(1, &["*.example.com"]), app(2, &["shop.example.com"])]);
        assert_eq!(table.resolve("shop.example.com").unwrap().id, 2);
        assert_eq!(table.resolve("blog.example.com").unwrap().id, 1);

        // Removing the exact mapping falls back to the wildcard.
        let table = RoutingTable::build(&[app(1, &["*.example.com"])]);
        assert_eq!(table.resolve("shop.example.com").unwrap().id, 1);
    }

    #[test]
    fn test_last_write_wins() {
        let table = RoutingTable::build(&[app(1, &["dup.example.com"]), app(2, &["dup.example.com"])]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("dup.example.com").unwrap().id, 2);
    }
}
