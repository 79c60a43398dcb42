//! Application/Destination registry.
//!
//! # Data Flow
//! ```text
//! Master node:
//!     store (select applications, destinations, domains)
//!     → build Application list
//!     → RegistrySnapshot (apps + RoutingTable)
//!     → ArcSwap::store (atomic publish)
//!
//! Replica node:
//!     replica.rs polls master → Vec<Application>
//!     → replace_all (wholesale, never merged)
//!
//! Admin update/delete (master only):
//!     validate → store writes → new snapshot → swap
//!     (store failure: error returned, snapshot untouched)
//! ```
//!
//! # Design Decisions
//! - Readers never lock: `ArcSwap::load` on the request path
//! - Writers serialize on a mutex and always publish a complete snapshot
//! - Destination and domain lists are set-reconciled, not patched

pub mod replica;
pub mod snapshot;
pub mod update;

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::config::schema::NodeRole;
use crate::config::validation::ValidationError;
use crate::models::{Application, Destination, Domain};
use crate::observability::metrics;
use crate::store::{ApplicationStore, StoreError};

pub use replica::{ReplicaSync, ReplicationError, REPLICATION_PATH};
pub use snapshot::RegistrySnapshot;
pub use update::{ApplicationUpdate, DestinationUpdate, DomainUpdate};

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("application {0} not found")]
    NotFound(i64),

    #[error("registry is read-only on replica nodes")]
    ReadOnly,

    #[error("invalid application: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

/// In-memory mirror of application configuration.
pub struct Registry {
    role: NodeRole,
    store: Arc<dyn ApplicationStore>,
    snapshot: ArcSwap<RegistrySnapshot>,
    writer: Mutex<()>,
}

impl Registry {
    /// Create an empty registry. Call [`Registry::reload`] (master) or
    /// [`Registry::replace_all`] (replica) to populate it.
    pub fn new(store: Arc<dyn ApplicationStore>, role: NodeRole) -> Self {
        Self {
            role,
            store,
            snapshot: ArcSwap::from_pointee(RegistrySnapshot::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.load_full()
    }

    pub fn version(&self) -> u64 {
        self.snapshot.load().version()
    }

    /// All applications, in order.
    pub fn applications(&self) -> Vec<Arc<Application>> {
        self.snapshot.load().applications().to_vec()
    }

    pub fn get(&self, id: i64) -> Result<Arc<Application>, RegistryError> {
        self.snapshot.load().get(id).cloned().ok_or(RegistryError::NotFound(id))
    }

    /// Resolve a host: exact domain, then single-level wildcard.
    pub fn get_by_domain(&self, host: &str) -> Option<Arc<Application>> {
        self.snapshot.load().resolve(host)
    }

    /// Application settings from the store, with empty lists.
    pub fn load_applications(&self) -> Result<Vec<Application>, RegistryError> {
        Ok(self.store.select_applications()?)
    }

    /// Fill in each application's destinations from the store.
    pub fn load_destinations(&self, apps: &mut [Application]) -> Result<(), RegistryError> {
        for app in apps.iter_mut() {
            app.destinations = self.store.select_destinations_by_app_id(app.id)?;
        }
        Ok(())
    }

    /// Attach every stored domain to its application.
    pub fn load_domain_names(&self, apps: &mut [Application]) -> Result<(), RegistryError> {
        let domains = self.store.select_domains()?;
        for app in apps.iter_mut() {
            app.domains = domains.iter().filter(|d| d.app_id == app.id).cloned().collect();
        }
        let orphans = domains.iter().filter(|d| !apps.iter().any(|a| a.id == d.app_id)).count();
        if orphans > 0 {
            tracing::warn!(count = orphans, "Domains reference unknown applications, ignoring them");
        }
        Ok(())
    }

    /// Rebuild the snapshot from the store (master only).
    pub fn reload(&self) -> Result<u64, RegistryError> {
        if self.role == NodeRole::Replica {
            return Err(RegistryError::ReadOnly);
        }
        let _guard = self.lock_writer();
        let mut apps = self.load_applications()?;
        self.load_destinations(&mut apps)?;
        self.load_domain_names(&mut apps)?;
        Ok(self.publish(apps.into_iter().map(Arc::new).collect()))
    }

    /// Replace every application at once (replica refresh).
    pub fn replace_all(&self, apps: Vec<Application>) -> u64 {
        let _guard = self.lock_writer();
        self.publish(apps.into_iter().map(Arc::new).collect())
    }

    /// Create or update an application and reconcile its destinations and
    /// domains against the desired state.
    pub fn update(&self, update: ApplicationUpdate) -> Result<Arc<Application>, RegistryError> {
        if self.role == NodeRole::Replica {
            return Err(RegistryError::ReadOnly);
        }
        update.validate().map_err(RegistryError::Validation)?;
        let update = update.normalized();

        let _guard = self.lock_writer();
        let current = self.snapshot.load_full();

        let (mut app, current_destinations, current_domains) = if update.id == 0 {
            let mut app = update.settings(0);
            app.id = self.store.insert_application(&app)?;
            tracing::info!(app = app.id, name = %app.name, "Application created");
            (app, Vec::new(), Vec::new())
        } else {
            let existing = current.get(update.id).ok_or(RegistryError::NotFound(update.id))?;
            let app = update.settings(existing.id);
            self.store.update_application(&app)?;
            (app, existing.destinations.clone(), existing.domains.clone())
        };

        app.destinations = self.reconcile_destinations(app.id, &current_destinations, &update.destinations)?;
        let (domains, moved) = self.reconcile_domains(&current, app.id, &current_domains, &update.domains)?;
        app.domains = domains;

        let app = Arc::new(app);
        let mut apps: Vec<Arc<Application>> = current
            .applications()
            .iter()
            .map(|other| {
                if other.id != app.id && other.domains.iter().any(|d| moved.contains(&d.id)) {
                    let mut changed = (**other).clone();
                    changed.domains.retain(|d| !moved.contains(&d.id));
                    Arc::new(changed)
                } else {
                    other.clone()
                }
            })
            .collect();
        match current.index_of(app.id) {
            Some(index) => apps[index] = app.clone(),
            None => apps.push(app.clone()),
        }

        self.publish(apps);
        Ok(app)
    }

    /// Delete an application with its domains, destinations and CC policies.
    pub fn delete(&self, id: i64) -> Result<(), RegistryError> {
        if self.role == NodeRole::Replica {
            return Err(RegistryError::ReadOnly);
        }
        let _guard = self.lock_writer();
        let current = self.snapshot.load_full();
        let index = current.index_of(id).ok_or(RegistryError::NotFound(id))?;

        self.store.delete_domains_by_app_id(id)?;
        self.store.delete_destinations_by_app_id(id)?;
        self.store.delete_cc_policies_by_app_id(id)?;
        self.store.delete_application(id)?;

        let mut apps = current.applications().to_vec();
        apps.remove(index);
        self.publish(apps);
        tracing::info!(app = id, "Application deleted");
        Ok(())
    }

    fn reconcile_destinations(
        &self,
        app_id: i64,
        current: &[Destination],
        desired: &[DestinationUpdate],
    ) -> Result<Vec<Destination>, RegistryError> {
        for existing in current {
            if !desired.iter().any(|d| d.id == existing.id) {
                self.store.delete_destination_by_id(existing.id)?;
            }
        }

        let mut result = Vec::with_capacity(desired.len());
        for wanted in desired {
            match current.iter().find(|c| wanted.id != 0 && c.id == wanted.id) {
                Some(existing) => {
                    let next = Destination {
                        id: existing.id,
                        app_id,
                        destination: wanted.destination.clone(),
                        node_id: wanted.node_id,
                    };
                    if &next != existing {
                        self.store.update_destination(&next)?;
                    }
                    result.push(next);
                }
                None => {
                    let id = self.store.insert_destination(app_id, &wanted.destination, wanted.node_id)?;
                    result.push(Destination {
                        id,
                        app_id,
                        destination: wanted.destination.clone(),
                        node_id: wanted.node_id,
                    });
                }
            }
        }
        Ok(result)
    }

    /// Returns the new domain list and the IDs of domains taken over from
    /// other applications.
    fn reconcile_domains(
        &self,
        snapshot: &RegistrySnapshot,
        app_id: i64,
        current: &[Domain],
        desired: &[DomainUpdate],
    ) -> Result<(Vec<Domain>, Vec<i64>), RegistryError> {
        let keeps = |existing: &Domain, wanted: &DomainUpdate| {
            existing.name == wanted.name && (wanted.id == 0 || wanted.id == existing.id)
        };

        for existing in current {
            if !desired.iter().any(|wanted| keeps(existing, wanted)) {
                self.store.delete_domain_by_id(existing.id)?;
            }
        }

        let mut result = Vec::with_capacity(desired.len());
        let mut moved = Vec::new();
        for wanted in desired {
            if let Some(existing) = current.iter().find(|existing| keeps(existing, wanted)) {
                result.push(existing.clone());
                continue;
            }
            for other in snapshot.applications().iter().filter(|a| a.id != app_id) {
                if let Some(owned) = other.domains.iter().find(|d| d.name == wanted.name) {
                    tracing::info!(
                        domain = %wanted.name,
                        from_app = other.id,
                        to_app = app_id,
                        "Moving domain between applications"
                    );
                    self.store.delete_domain_by_id(owned.id)?;
                    moved.push(owned.id);
                }
            }
            let id = self.store.insert_domain(app_id, &wanted.name)?;
            result.push(Domain {
                id,
                app_id,
                name: wanted.name.clone(),
            });
        }
        Ok((result, moved))
    }

    fn publish(&self, apps: Vec<Arc<Application>>) -> u64 {
        let version = self.snapshot.load().version() + 1;
        let snapshot = RegistrySnapshot::new(version, apps);
        tracing::info!(
            version,
            applications = snapshot.applications().len(),
            domains = snapshot.routes().len(),
            "Registry snapshot published"
        );
        self.snapshot.store(Arc::new(snapshot));
        metrics::record_registry_version(version);
        version
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state.
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
