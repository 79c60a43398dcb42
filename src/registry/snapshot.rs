//! Immutable, versioned view of all applications.

use std::sync::Arc;

use crate::models::Application;
use crate::routing::RoutingTable;

/// Applications plus the routing table derived from them.
///
/// Built in full and published with a single pointer swap; readers holding
/// an older snapshot keep a consistent view until they drop it.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    version: u64,
    apps: Vec<Arc<Application>>,
    routes: RoutingTable,
}

impl RegistrySnapshot {
    pub fn new(version: u64, apps: Vec<Arc<Application>>) -> Self {
        let routes = RoutingTable::build(&apps);
        Self { version, apps, routes }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn applications(&self) -> &[Arc<Application>] {
        &self.apps
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn get(&self, id: i64) -> Option<&Arc<Application>> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Position of an application in the ordered list.
    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.apps.iter().position(|app| app.id == id)
    }

    pub fn resolve(&self, host: &str) -> Option<Arc<Application>> {
        self.routes.resolve(host)
    }
}
