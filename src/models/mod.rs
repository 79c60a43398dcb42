//! Domain model shared by every subsystem.
//!
//! # Ownership
//! ```text
//! Registry snapshot
//!     → Application (settings + destinations + domains)
//!         → Destination (backend address, serving node)
//!         → Domain (exact or `*.suffix` host pattern)
//!
//! Enforcement pipeline (per request, transient):
//!     → Policy (evaluator verdict)
//!     → HitInfo (block page / CAPTCHA state input)
//! ```
//!
//! # Design Decisions
//! - Everything is serde-serializable: applications travel master → replica
//!   as JSON and the file store persists them the same way
//! - Enumerations carry the legacy numeric codes for interop with existing
//!   data, but serialize by name

pub mod application;
pub mod policy;

pub use application::{Application, Destination, Domain, InternalScheme, IpMethod};
pub use policy::{CcPolicy, HitInfo, HitType, Policy, PolicyAction};
