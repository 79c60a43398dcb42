//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.tls configured
//!     → tls.rs (load PEM certificate chain + key)
//!     → axum-server rustls listener
//!     → requests tagged ClientTransport::Tls
//! ```
//!
//! # Design Decisions
//! - TLS is optional; the plain listener always runs
//! - Certificates are read from disk at startup, never issued or renewed here

pub mod tls;
