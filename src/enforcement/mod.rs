//! Response enforcement subsystem.
//!
//! # Data Flow
//! ```text
//! Backend response
//!     → headers.rs   rewrite_location (non-standard port → client scheme)
//!     → headers.rs   hide_powered_by
//!     → waf          evaluator verdict (waf_enabled only)
//!         Block        → block_page.rs, 403, stop
//!         BypassAndLog → audit, continue
//!         Captcha      → captcha store, 307, stop
//!         Pass         → continue
//!     → headers.rs   HSTS (TLS client), CSP, downgrade (plain client, https backend)
//!     → cache.rs     static objects ≤ max_object_bytes written to disk
//!     → client
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed; later stages never see a blocked response
//! - Evaluation errors fail open
//! - Cache writes are detached and cannot fail the request

pub mod block_page;
pub mod cache;
pub mod headers;
pub mod pipeline;

pub use cache::{CacheError, StaticCache};
pub use pipeline::ResponseEnforcer;
