//! In-memory store with optional JSON file persistence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::models::{Application, CcPolicy, Destination, Domain};
use crate::store::{ApplicationStore, StoreError, StoreResult};

/// On-disk layout of the data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreData {
    next_app_id: i64,
    next_destination_id: i64,
    next_domain_id: i64,
    applications: Vec<Application>,
    destinations: Vec<Destination>,
    domains: Vec<Domain>,
    cc_policies: Vec<CcPolicy>,
}

impl StoreData {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// Make sure sequences are ahead of any ID already present (hand-edited files).
    fn repair_sequences(&mut self) {
        let max_app = self.applications.iter().map(|a| a.id).max().unwrap_or(0);
        let max_dest = self.destinations.iter().map(|d| d.id).max().unwrap_or(0);
        let max_domain = self.domains.iter().map(|d| d.id).max().unwrap_or(0);
        self.next_app_id = self.next_app_id.max(max_app);
        self.next_destination_id = self.next_destination_id.max(max_dest);
        self.next_domain_id = self.next_domain_id.max(max_domain);
    }
}

/// A thread-safe application store.
///
/// Writes are applied to a copy, persisted, and only then committed, so a
/// failed disk write leaves the store unchanged.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            data: Mutex::new(StoreData::default()),
            persistence_path,
        }
    }

    /// Load from file if it exists; later writes go to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Self::new(Some(path.as_ref().to_path_buf()));
        store.refresh_from_file()?;
        Ok(store)
    }

    /// Re-read the backing file, replacing the in-memory tables. A missing
    /// file or a store without persistence is left untouched.
    pub fn refresh_from_file(&self) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let mut current = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        let content = fs::read(path)?;
        let mut data: StoreData = serde_json::from_slice(&content)?;
        data.repair_sequences();
        tracing::info!(
            path = ?path,
            applications = data.applications.len(),
            destinations = data.destinations.len(),
            domains = data.domains.len(),
            "Loaded application store"
        );
        *current = data;
        Ok(())
    }

    /// Path of the backing data file, if any.
    pub fn persistence_path(&self) -> Option<&Path> {
        self.persistence_path.as_deref()
    }

    /// Store a CC policy for an application.
    pub fn insert_cc_policy(&self, policy: CcPolicy) -> StoreResult<()> {
        self.mutate(|data| {
            data.cc_policies.push(policy);
            Ok(())
        })
    }

    /// CC policies of an application.
    pub fn select_cc_policies_by_app_id(&self, app_id: i64) -> StoreResult<Vec<CcPolicy>> {
        self.read(|data| data.cc_policies.iter().filter(|p| p.app_id == app_id).cloned().collect())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> StoreResult<T> {
        let data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&data))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> StoreResult<T>) -> StoreResult<T> {
        let mut data = self.data.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = data.clone();
        let result = f(&mut next)?;
        self.persist(&next)?;
        *data = next;
        Ok(result)
    }

    fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl ApplicationStore for MemoryStore {
    fn select_applications(&self) -> StoreResult<Vec<Application>> {
        self.read(|data| data.applications.iter().map(Application::settings_only).collect())
    }

    fn select_destinations_by_app_id(&self, app_id: i64) -> StoreResult<Vec<Destination>> {
        self.read(|data| data.destinations.iter().filter(|d| d.app_id == app_id).cloned().collect())
    }

    fn select_domains(&self) -> StoreResult<Vec<Domain>> {
        self.read(|data| data.domains.clone())
    }

    fn insert_application(&self, app: &Application) -> StoreResult<i64> {
        self.mutate(|data| {
            let id = StoreData::next(&mut data.next_app_id);
            let mut record = app.settings_only();
            record.id = id;
            data.applications.push(record);
            Ok(id)
        })
    }

    fn update_application(&self, app: &Application) -> StoreResult<()> {
        self.mutate(|data| {
            let record = data
                .applications
                .iter_mut()
                .find(|a| a.id == app.id)
                .ok_or_else(|| StoreError::NotFound(format!("application {}", app.id)))?;
            *record = app.settings_only();
            Ok(())
        })
    }

    fn delete_application(&self, app_id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            let before = data.applications.len();
            data.applications.retain(|a| a.id != app_id);
            if data.applications.len() == before {
                return Err(StoreError::NotFound(format!("application {}", app_id)));
            }
            Ok(())
        })
    }

    fn insert_destination(&self, app_id: i64, destination: &str, node_id: i64) -> StoreResult<i64> {
        self.mutate(|data| {
            let id = StoreData::next(&mut data.next_destination_id);
            data.destinations.push(Destination {
                id,
                app_id,
                destination: destination.to_string(),
                node_id,
            });
            Ok(id)
        })
    }

    fn update_destination(&self, destination: &Destination) -> StoreResult<()> {
        self.mutate(|data| {
            let record = data
                .destinations
                .iter_mut()
                .find(|d| d.id == destination.id)
                .ok_or_else(|| StoreError::NotFound(format!("destination {}", destination.id)))?;
            *record = destination.clone();
            Ok(())
        })
    }

    fn delete_destination_by_id(&self, id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            data.destinations.retain(|d| d.id != id);
            Ok(())
        })
    }

    fn delete_destinations_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            data.destinations.retain(|d| d.app_id != app_id);
            Ok(())
        })
    }

    fn insert_domain(&self, app_id: i64, name: &str) -> StoreResult<i64> {
        self.mutate(|data| {
            let id = StoreData::next(&mut data.next_domain_id);
            data.domains.push(Domain { id, app_id, name: name.to_string() });
            Ok(id)
        })
    }

    fn delete_domain_by_id(&self, id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            data.domains.retain(|d| d.id != id);
            Ok(())
        })
    }

    fn delete_domains_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            data.domains.retain(|d| d.app_id != app_id);
            Ok(())
        })
    }

    fn delete_cc_policies_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.mutate(|data| {
            data.cc_policies.retain(|p| p.app_id != app_id);
            Ok(())
        })
    }
}
