//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Application data (domains, destinations) is NOT configuration; it lives
//!   in the store and is reloaded through the registry
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, AuditConfig, CacheConfig, ClusterConfig, EnforcementConfig, ListenerConfig, NodeRole,
    ObservabilityConfig, ResponseRuleConfig, SelectionStrategy, StoreConfig, TlsConfig, UpstreamConfig,
    WafConfig,
};
