//! Resilience helpers.
//!
//! Replica synchronisation retries the master with exponential backoff
//! (`backoff.rs`). Client requests are never retried.

pub mod backoff;
