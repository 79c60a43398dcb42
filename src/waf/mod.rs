//! WAF collaborators used by the response pipeline.
//!
//! # Data Flow
//! ```text
//! Backend response
//!     → client_ip.rs (real client IP per application ip_method)
//!     → evaluator.rs (response rules → Option<Policy>)
//!     → audit.rs (hit record → bounded channel → JSON-lines writer)
//! ```
//!
//! # Design Decisions
//! - Rule evaluation is behind the `PolicyEvaluator` trait; the rule engine
//!   proper is pluggable
//! - Hit logging never blocks the request path: a full channel drops the
//!   record with a warning

pub mod audit;
pub mod client_ip;
pub mod evaluator;

pub use audit::{HitLogger, PolicyHitRecord};
pub use client_ip::client_ip;
pub use evaluator::{EvalError, PolicyEvaluator, RuleEvaluator};
