//! Destination selection subsystem.
//!
//! # Data Flow
//! ```text
//! Application resolved → destinations list
//!     → Apply selection algorithm:
//!         - clock.rs (sub-second clock modulo count, default)
//!         - round_robin.rs (rotate through destinations)
//!     → Return destination or NoBackend
//! ```
//!
//! # Design Decisions
//! - Selection is not a fairness guarantee; it only spreads traffic
//! - An application without destinations is an explicit error, never a panic
//! - Algorithm chosen once at startup from configuration

pub mod clock;
pub mod round_robin;

use thiserror::Error;

use crate::config::schema::SelectionStrategy;
use crate::models::{Application, Destination};

pub use clock::ClockSelector;
pub use round_robin::RoundRobin;

/// Selection failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    /// The application has no configured destinations.
    #[error("application {0} has no backend destinations")]
    NoBackend(i64),
}

/// Trait for destination selection strategies.
pub trait DestinationSelector: Send + Sync + std::fmt::Debug {
    /// Pick one destination of `app`.
    fn select<'a>(&self, app: &'a Application) -> Result<&'a Destination, SelectError>;
}

/// Build the selector configured for this gateway.
pub fn from_strategy(strategy: SelectionStrategy) -> Box<dyn DestinationSelector> {
    match strategy {
        SelectionStrategy::Clock => Box::new(ClockSelector::new()),
        SelectionStrategy::RoundRobin => Box::new(RoundRobin::new()),
    }
}
