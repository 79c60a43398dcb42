//! Time-seeded destination selection.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::load_balancer::{DestinationSelector, SelectError};
use crate::models::{Application, Destination};

/// Picks `now.subsec_nanos() % len`.
///
/// Spreads load across destinations without any shared state. Not suitable
/// where strict rotation or unpredictability matters.
#[derive(Debug, Default)]
pub struct ClockSelector;

impl ClockSelector {
    pub fn new() -> Self {
        Self
    }
}

impl DestinationSelector for ClockSelector {
    fn select<'a>(&self, app: &'a Application) -> Result<&'a Destination, SelectError> {
        let destination = match app.destinations.len() {
            0 => return Err(SelectError::NoBackend(app.id)),
            1 => &app.destinations[0],
            len => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos() as usize;
                &app.destinations[nanos % len]
            }
        };
        tracing::trace!(app = app.id, destination = %destination.destination, "Destination selected");
        Ok(destination)
    }
}
