//! Replica-side refresh from the master node.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::ClusterConfig;
use crate::models::Application;
use crate::registry::Registry;
use crate::resilience::backoff::calculate_backoff;

/// Master endpoint serving the full application list.
pub const REPLICATION_PATH: &str = "/api/replication/applications";

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("replication request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("master responded with {0}")]
    Status(StatusCode),

    #[error("cluster.master_url is not set")]
    MissingMasterUrl,
}

/// Periodically pulls the application list from the master and replaces the
/// local registry with it.
pub struct ReplicaSync {
    registry: Arc<Registry>,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    config: ClusterConfig,
}

impl ReplicaSync {
    pub fn new(registry: Arc<Registry>, config: ClusterConfig, api_key: String) -> Result<Self, ReplicationError> {
        let master = config.master_url.as_deref().ok_or(ReplicationError::MissingMasterUrl)?;
        let endpoint = format!("{}{}", master.trim_end_matches('/'), REPLICATION_PATH);
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            registry,
            client,
            endpoint,
            api_key,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn fetch_applications(&self) -> Result<Vec<Application>, ReplicationError> {
        let response = self.client.get(&self.endpoint).bearer_auth(&self.api_key).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReplicationError::Status(status));
        }
        Ok(response.json::<Vec<Application>>().await?)
    }

    /// Fetch once and replace the registry. Returns the new snapshot version.
    pub async fn sync_once(&self) -> Result<u64, ReplicationError> {
        let apps = self.fetch_applications().await?;
        let count = apps.len();
        let version = self.registry.replace_all(apps);
        tracing::debug!(version, applications = count, "Replica registry refreshed");
        Ok(version)
    }

    /// Refresh loop. Failures keep the last good snapshot and retry with
    /// exponential backoff until the next success.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            endpoint = %self.endpoint,
            interval = self.config.sync_interval_secs,
            "Replica sync starting"
        );

        let interval = Duration::from_secs(self.config.sync_interval_secs);
        let mut failures: u32 = 0;

        loop {
            let delay = match self.sync_once().await {
                Ok(_) => {
                    failures = 0;
                    interval
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let backoff = calculate_backoff(
                        failures,
                        self.config.retry_base_delay_ms,
                        self.config.retry_max_delay_ms,
                    );
                    tracing::warn!(error = %e, attempt = failures, delay = ?backoff, "Replica sync failed");
                    backoff
                }
            };

            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Replica sync received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodeRole;
    use crate::store::MemoryStore;

    #[test]
    fn test_requires_master_url() {
        let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new(None)), NodeRole::Replica));
        let result = ReplicaSync::new(registry, ClusterConfig::default(), "key".into());
        assert!(matches!(result, Err(ReplicationError::MissingMasterUrl)));
    }

    #[test]
    fn test_endpoint_joins_path() {
        let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new(None)), NodeRole::Replica));
        let config = ClusterConfig {
            role: NodeRole::Replica,
            master_url: Some("http://10.0.0.1:8081/".into()),
            ..ClusterConfig::default()
        };
        let sync = ReplicaSync::new(registry, config, "key".into()).unwrap();
        assert_eq!(sync.endpoint(), "http://10.0.0.1:8081/api/replication/applications");
    }
}
