//! Persistent application store.
//!
//! # Data Flow
//! ```text
//! Registry (master only)
//!     → ApplicationStore trait (select / insert / update / delete)
//!     → memory.rs (in-memory tables, optional JSON file persistence)
//!
//! watcher.rs:
//!     data file modified on disk
//!     → reload notification
//!     → registry rebuilds its snapshot from the store
//! ```
//!
//! # Design Decisions
//! - The registry only talks to the trait; SQL backends can slot in later
//! - Calls are synchronous: they run on admin paths, never per request
//! - A write either reaches disk or leaves the store unchanged

pub mod memory;
pub mod watcher;

use thiserror::Error;

use crate::models::{Application, Destination, Domain};

pub use memory::MemoryStore;
pub use watcher::StoreWatcher;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while persisting or loading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A previous writer panicked while holding the store lock.
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistent store consumed by the registry.
///
/// Applications returned by `select_applications` carry empty destination and
/// domain lists; those are loaded separately.
pub trait ApplicationStore: Send + Sync {
    fn select_applications(&self) -> StoreResult<Vec<Application>>;
    fn select_destinations_by_app_id(&self, app_id: i64) -> StoreResult<Vec<Destination>>;
    fn select_domains(&self) -> StoreResult<Vec<Domain>>;

    /// Insert the scalar settings of `app`, returning the generated ID.
    fn insert_application(&self, app: &Application) -> StoreResult<i64>;
    fn update_application(&self, app: &Application) -> StoreResult<()>;
    fn delete_application(&self, app_id: i64) -> StoreResult<()>;

    fn insert_destination(&self, app_id: i64, destination: &str, node_id: i64) -> StoreResult<i64>;
    fn update_destination(&self, destination: &Destination) -> StoreResult<()>;
    fn delete_destination_by_id(&self, id: i64) -> StoreResult<()>;
    fn delete_destinations_by_app_id(&self, app_id: i64) -> StoreResult<()>;

    fn insert_domain(&self, app_id: i64, name: &str) -> StoreResult<i64>;
    fn delete_domain_by_id(&self, id: i64) -> StoreResult<()>;
    fn delete_domains_by_app_id(&self, app_id: i64) -> StoreResult<()>;

    fn delete_cc_policies_by_app_id(&self, app_id: i64) -> StoreResult<()>;
}
