//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → matcher.rs (normalize host, derive wildcard form)
//!     → table.rs (exact lookup, then `*.suffix` lookup)
//!     → Return: matched Application or None
//!
//! Table Compilation (on every registry change):
//!     Application[] with domains
//!     → Build HashMap<domain, Arc<Application>> (last write wins)
//!     → Freeze inside a registry snapshot
//!     → Atomic swap (readers never see a half-built table)
//! ```
//!
//! # Design Decisions
//! - Tables are immutable once built; changes build a new table
//! - Host matching is case-insensitive and ignores the port
//! - Single-level wildcards only: `a.b.example.com` never falls back to
//!   `*.example.com`

pub mod matcher;
pub mod table;

pub use matcher::{normalize_host, wildcard_of};
pub use table::RoutingTable;
