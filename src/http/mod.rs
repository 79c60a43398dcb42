//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, transport tag)
//!     → request.rs (RequestContext: method, host, headers, peer)
//!     → registry lookup → destination selection
//!     → upstream.rs (forward to backend, hop-by-hop headers stripped)
//!     → enforcement pipeline
//!     → Send to client
//! ```

pub mod request;
pub mod server;
pub mod upstream;

pub use request::{ClientTransport, RequestContext, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
pub use upstream::{UpstreamClient, UpstreamError};
