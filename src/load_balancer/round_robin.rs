//! Round-robin destination selection.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{DestinationSelector, SelectError};
use crate::models::{Application, Destination};

/// Round-robin selector.
/// Stores an internal counter to rotate through destinations. The counter is
/// shared by all applications, so rotation is per gateway, not per app.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DestinationSelector for RoundRobin {
    fn select<'a>(&self, app: &'a Application) -> Result<&'a Destination, SelectError> {
        let len = app.destinations.len();
        if len == 0 {
            return Err(SelectError::NoBackend(app.id));
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % len;
        Ok(&app.destinations[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let mut app = Application::new(1, "a");
        app.destinations = vec![
            Destination { id: 1, app_id: 1, destination: "127.0.0.1:8080".into(), node_id: 0 },
            Destination { id: 2, app_id: 1, destination: "127.0.0.1:8081".into(), node_id: 0 },
        ];

        assert_eq!(lb.select(&app).unwrap().id, 1);
        assert_eq!(lb.select(&app).unwrap().id, 2);
        assert_eq!(lb.select(&app).unwrap().id, 1);
    }

    #[test]
    fn test_empty() {
        let lb = RoundRobin::new();
        let app = Application::new(9, "empty");
        assert_eq!(lb.select(&app).unwrap_err(), SelectError::NoBackend(9));
    }
}
