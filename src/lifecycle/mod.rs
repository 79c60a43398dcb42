//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → broadcast → listeners drain, background tasks exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!     SIGHUP → registry reload from the store
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
