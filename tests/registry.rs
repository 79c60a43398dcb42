mod common;

use std::sync::{Arc, Mutex};

use common::{application, start_backend, MockResponse};
use waf_gateway::config::{ClusterConfig, NodeRole};
use waf_gateway::models::{Application, Destination, Domain};
use waf_gateway::registry::{ApplicationUpdate, DestinationUpdate, DomainUpdate, Registry, RegistryError, ReplicaSync};
use waf_gateway::store::{ApplicationStore, MemoryStore, StoreError, StoreResult};

/// Store wrapper that records every write and can be told to fail one kind
/// of write.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<&'static str>>,
}

impl RecordingStore {
    fn record(&self, call: String) -> StoreResult<()> {
        let failing = *self.fail_on.lock().unwrap();
        if failing.is_some_and(|prefix| call.starts_with(prefix)) {
            return Err(StoreError::Io(std::io::Error::other(format!("{} rejected", call))));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn fail_on(&self, prefix: &'static str) {
        *self.fail_on.lock().unwrap() = Some(prefix);
    }

    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl ApplicationStore for RecordingStore {
    fn select_applications(&self) -> StoreResult<Vec<Application>> {
        self.inner.select_applications()
    }

    fn select_destinations_by_app_id(&self, app_id: i64) -> StoreResult<Vec<Destination>> {
        self.inner.select_destinations_by_app_id(app_id)
    }

    fn select_domains(&self) -> StoreResult<Vec<Domain>> {
        self.inner.select_domains()
    }

    fn insert_application(&self, app: &Application) -> StoreResult<i64> {
        self.record("insert_application".into())?;
        self.inner.insert_application(app)
    }

    fn update_application(&self, app: &Application) -> StoreResult<()> {
        self.record(format!("update_application {}", app.id))?;
        self.inner.update_application(app)
    }

    fn delete_application(&self, app_id: i64) -> StoreResult<()> {
        self.record(format!("delete_application {}", app_id))?;
        self.inner.delete_application(app_id)
    }

    fn insert_destination(&self, app_id: i64, destination: &str, node_id: i64) -> StoreResult<i64> {
        self.record(format!("insert_destination {}", destination))?;
        self.inner.insert_destination(app_id, destination, node_id)
    }

    fn update_destination(&self, destination: &Destination) -> StoreResult<()> {
        self.record(format!("update_destination {}", destination.id))?;
        self.inner.update_destination(destination)
    }

    fn delete_destination_by_id(&self, id: i64) -> StoreResult<()> {
        self.record(format!("delete_destination {}", id))?;
        self.inner.delete_destination_by_id(id)
    }

    fn delete_destinations_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.record(format!("delete_destinations_of {}", app_id))?;
        self.inner.delete_destinations_by_app_id(app_id)
    }

    fn insert_domain(&self, app_id: i64, name: &str) -> StoreResult<i64> {
        self.record(format!("insert_domain {}", name))?;
        self.inner.insert_domain(app_id, name)
    }

    fn delete_domain_by_id(&self, id: i64) -> StoreResult<()> {
        self.record(format!("delete_domain {}", id))?;
        self.inner.delete_domain_by_id(id)
    }

    fn delete_domains_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.record(format!("delete_domains_of {}", app_id))?;
        self.inner.delete_domains_by_app_id(app_id)
    }

    fn delete_cc_policies_by_app_id(&self, app_id: i64) -> StoreResult<()> {
        self.record(format!("delete_cc_policies_of {}", app_id))?;
        self.inner.delete_cc_policies_by_app_id(app_id)
    }
}

fn destination(id: i64, address: &str) -> DestinationUpdate {
    DestinationUpdate {
        id,
        destination: address.to_string(),
        node_id: 0,
    }
}

fn domain(name: &str) -> DomainUpdate {
    DomainUpdate {
        id: 0,
        name: name.to_string(),
    }
}

fn setup() -> (Arc<RecordingStore>, Registry) {
    let store = Arc::new(RecordingStore::default());
    let registry = Registry::new(store.clone(), NodeRole::Master);
    (store, registry)
}

#[test]
fn test_destination_reconcile_touches_only_the_difference() {
    let (store, registry) = setup();

    let mut create = ApplicationUpdate::new("shop");
    create.destinations = vec![destination(0, "10.0.0.1:80"), destination(0, "10.0.0.2:80"), destination(0, "10.0.0.3:80")];
    create.domains = vec![domain("shop.test")];
    let created = registry.update(create).unwrap();
    let ids: Vec<i64> = created.destinations.iter().map(|d| d.id).collect();
    store.take_calls();

    let mut update = ApplicationUpdate::new("shop");
    update.id = created.id;
    update.destinations = vec![
        destination(ids[1], "10.0.0.2:80"),
        destination(ids[2], "10.0.0.3:80"),
        destination(0, "10.0.0.4:80"),
    ];
    update.domains = vec![domain("shop.test")];
    let updated = registry.update(update).unwrap();

    assert_eq!(
        store.take_calls(),
        vec![
            format!("update_application {}", created.id),
            format!("delete_destination {}", ids[0]),
            "insert_destination 10.0.0.4:80".to_string(),
        ]
    );
    let addresses: Vec<&str> = updated.destinations.iter().map(|d| d.destination.as_str()).collect();
    assert_eq!(addresses, ["10.0.0.2:80", "10.0.0.3:80", "10.0.0.4:80"]);
}

#[test]
fn test_delete_cascades_in_order() {
    let (store, registry) = setup();

    let mut create = ApplicationUpdate::new("blog");
    create.destinations = vec![destination(0, "10.0.0.9:80")];
    create.domains = vec![domain("blog.test")];
    let app = registry.update(create).unwrap();
    assert!(registry.get_by_domain("blog.test").is_some());
    store.take_calls();

    registry.delete(app.id).unwrap();

    assert_eq!(
        store.take_calls(),
        vec![
            format!("delete_domains_of {}", app.id),
            format!("delete_destinations_of {}", app.id),
            format!("delete_cc_policies_of {}", app.id),
            format!("delete_application {}", app.id),
        ]
    );
    assert!(registry.get_by_domain("blog.test").is_none());
    assert!(registry.get(app.id).is_err());
}

#[test]
fn test_domain_moves_between_applications() {
    let (_, registry) = setup();

    let mut first = ApplicationUpdate::new("first");
    first.domains = vec![domain("shared.test"), domain("first.test")];
    let first = registry.update(first).unwrap();

    let mut second = ApplicationUpdate::new("second");
    second.domains = vec![domain("shared.test")];
    let second = registry.update(second).unwrap();

    assert_eq!(registry.get_by_domain("shared.test").unwrap().id, second.id);
    assert_eq!(registry.get_by_domain("first.test").unwrap().id, first.id);

    let first_now = registry.get(first.id).unwrap();
    let names: Vec<&str> = first_now.domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["first.test"]);
}

#[test]
fn test_reload_rebuilds_the_same_view() {
    let (store, registry) = setup();

    let mut create = ApplicationUpdate::new("api");
    create.destinations = vec![destination(0, "10.0.1.1:8080")];
    create.domains = vec![domain("*.api.test")];
    let app = registry.update(create).unwrap();

    let fresh = Registry::new(store.clone(), NodeRole::Master);
    fresh.reload().unwrap();

    let reloaded = fresh.get_by_domain("v1.api.test").unwrap();
    assert_eq!(reloaded.id, app.id);
    assert_eq!(reloaded.destinations, app.destinations);
    assert_eq!(reloaded.domains, app.domains);
}

#[test]
fn test_failed_store_write_leaves_registry_untouched() {
    let (store, registry) = setup();

    let mut create = ApplicationUpdate::new("shop");
    create.destinations = vec![destination(0, "10.0.0.1:80")];
    create.domains = vec![domain("shop.test")];
    let app = registry.update(create).unwrap();
    let version = registry.version();

    store.fail_on("insert_destination");
    let mut update = ApplicationUpdate::new("shop renamed");
    update.id = app.id;
    update.destinations = vec![destination(app.destinations[0].id, "10.0.0.1:80"), destination(0, "10.0.0.2:80")];
    update.domains = vec![domain("shop.test"), domain("new.shop.test")];
    let err = registry.update(update).unwrap_err();
    assert!(matches!(err, RegistryError::Store(_)));

    assert_eq!(registry.version(), version);
    assert_eq!(registry.applications().len(), 1);
    assert_eq!(registry.get(app.id).unwrap().name, "shop");
    assert_eq!(registry.get(app.id).unwrap().destinations.len(), 1);
    assert!(registry.get_by_domain("new.shop.test").is_none());

    store.fail_on("delete_application");
    assert!(matches!(registry.delete(app.id), Err(RegistryError::Store(_))));
    assert_eq!(registry.version(), version);
    assert_eq!(registry.get_by_domain("shop.test").unwrap().id, app.id);
}

fn replica_config(master: std::net::SocketAddr) -> ClusterConfig {
    ClusterConfig {
        role: NodeRole::Replica,
        master_url: Some(format!("http://{}/", master)),
        ..ClusterConfig::default()
    }
}

#[tokio::test]
async fn test_replica_sync_replaces_applications_wholesale() {
    let served = serde_json::to_string(&vec![
        application(7, "seven.test", None),
        application(8, "eight.test", None),
    ])
    .unwrap();
    let master = start_backend(move |head| {
        if head.to_ascii_lowercase().contains("authorization: bearer replica-key") {
            MockResponse::ok(served.clone()).header("Content-Type", "application/json")
        } else {
            MockResponse {
                status: "401 Unauthorized",
                headers: Vec::new(),
                body: String::new(),
            }
        }
    })
    .await;

    let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new(None)), NodeRole::Replica));
    registry.replace_all(vec![application(1, "stale.test", None)]);

    let sync = ReplicaSync::new(registry.clone(), replica_config(master), "replica-key".to_string()).unwrap();
    let version = sync.sync_once().await.unwrap();

    assert_eq!(registry.version(), version);
    assert!(registry.get_by_domain("stale.test").is_none());
    assert_eq!(registry.get_by_domain("seven.test").unwrap().id, 7);
    assert_eq!(registry.get_by_domain("eight.test").unwrap().id, 8);

    let wrong_key = ReplicaSync::new(registry.clone(), replica_config(master), "other".to_string()).unwrap();
    assert!(wrong_key.sync_once().await.is_err());
    assert_eq!(registry.version(), version);
}

#[tokio::test]
async fn test_replica_keeps_snapshot_when_master_fails() {
    let master = start_backend(|_| MockResponse {
        status: "500 Internal Server Error",
        headers: Vec::new(),
        body: "boom".to_string(),
    })
    .await;

    let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new(None)), NodeRole::Replica));
    let version = registry.replace_all(vec![application(3, "kept.test", None)]);

    let sync = ReplicaSync::new(registry.clone(), replica_config(master), "replica-key".to_string()).unwrap();
    assert!(sync.sync_once().await.is_err());
    assert!(sync.fetch_applications().await.is_err());

    assert_eq!(registry.version(), version);
    assert_eq!(registry.get_by_domain("kept.test").unwrap().id, 3);
}
