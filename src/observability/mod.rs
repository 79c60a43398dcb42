//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log lines
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never formatted strings, for anything queryable
//! - Request ID flows from the inbound request to the backend and into logs
//! - Metric updates are cheap (atomic increments)

pub mod logging;
pub mod metrics;
