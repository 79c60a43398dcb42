//! CAPTCHA challenge state.
//!
//! # Data Flow
//! ```text
//! Pipeline (CAPTCHA verdict)
//!     → client_id.rs (opaque ID)
//!     → CaptchaStore::issue (ID → HitInfo)
//!     → 307 to <captcha_entrance>?id=<ID>
//!
//! CAPTCHA UI (external)
//!     → lookup / remove
//!
//! Sweeper task (every captcha_sweep_secs)
//!     → purge_expired
//! ```
//!
//! # Design Decisions
//! - Entries expire after a TTL; expired entries are invisible before the
//!   sweeper reclaims them
//! - Key-level locking only (DashMap), no global lock

pub mod client_id;

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::models::HitInfo;
use crate::observability::metrics;

pub use client_id::generate_client_id;

#[derive(Debug, Clone)]
struct Entry {
    hit: HitInfo,
    issued_at: Instant,
}

/// Pending CAPTCHA challenges keyed by client ID.
#[derive(Debug)]
pub struct CaptchaStore {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl CaptchaStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn issue(&self, client_id: impl Into<String>, hit: HitInfo) {
        self.entries.insert(
            client_id.into(),
            Entry {
                hit,
                issued_at: Instant::now(),
            },
        );
        metrics::record_captcha_entries(self.entries.len());
    }

    /// The hit behind a pending challenge, unless it has expired.
    pub fn lookup(&self, client_id: &str) -> Option<HitInfo> {
        let entry = self.entries.get(client_id)?;
        if entry.issued_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.hit.clone())
    }

    pub fn remove(&self, client_id: &str) -> Option<HitInfo> {
        let removed = self.entries.remove(client_id).map(|(_, entry)| entry.hit);
        metrics::record_captcha_entries(self.entries.len());
        removed
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.issued_at.elapsed() < self.ttl);
        let after = self.entries.len();
        metrics::record_captcha_entries(after);
        before.saturating_sub(after)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically purge expired entries until shutdown.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?interval, ttl = ?self.ttl, "CAPTCHA sweeper starting");
        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = self.len(), "Expired CAPTCHA challenges purged");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("CAPTCHA sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
