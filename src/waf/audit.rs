//! Policy hit audit log.
//!
//! Producers call [`HitLogger::log_policy_hit`] from the request path; a
//! background task drains the channel into a JSON-lines file, or into
//! `tracing` when no file is configured.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::http::request::RequestContext;
use crate::models::{Policy, PolicyAction};
use crate::observability::metrics;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// One policy hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyHitRecord {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub request_id: String,
    pub app_id: i64,
    pub client_ip: IpAddr,
    pub method: String,
    pub host: String,
    pub path: String,
    pub policy_id: i64,
    pub vuln_name: String,
    pub action: PolicyAction,
}

impl PolicyHitRecord {
    pub fn new(request: &RequestContext, app_id: i64, client_ip: IpAddr, policy: &Policy) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            request_id: request.request_id().to_string(),
            app_id,
            client_ip,
            method: request.method.to_string(),
            host: request.host.clone(),
            path: request.path().to_string(),
            policy_id: policy.id,
            vuln_name: policy.vuln_name.clone(),
            action: policy.action,
        }
    }
}

/// Cloneable, non-blocking handle to the audit channel.
#[derive(Debug, Clone)]
pub struct HitLogger {
    tx: mpsc::Sender<PolicyHitRecord>,
}

impl HitLogger {
    /// Create a logger and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PolicyHitRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a hit record. Never waits: a full or closed channel drops the
    /// record with a warning.
    pub fn log_policy_hit(&self, request: &RequestContext, app_id: i64, client_ip: IpAddr, policy: &Policy) {
        metrics::record_policy_hit(policy.action.as_str());
        let record = PolicyHitRecord::new(request, app_id, client_ip, policy);
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(policy_id = record.policy_id, app = app_id, "Audit channel full, hit dropped");
            }
            Err(TrySendError::Closed(record)) => {
                tracing::warn!(policy_id = record.policy_id, app = app_id, "Audit channel closed, hit dropped");
            }
        }
    }

    /// Spawn the background writer. Exits once every logger clone is dropped.
    pub fn spawn_writer(rx: mpsc::Receiver<PolicyHitRecord>, path: Option<PathBuf>) -> JoinHandle<()> {
        tokio::spawn(async move {
            match path {
                Some(path) => write_json_lines(&path, rx).await,
                None => log_to_tracing(rx).await,
            }
        })
    }
}

async fn log_to_tracing(mut rx: mpsc::Receiver<PolicyHitRecord>) {
    while let Some(record) = rx.recv().await {
        tracing::warn!(
            request_id = %record.request_id,
            app = record.app_id,
            client_ip = %record.client_ip,
            method = %record.method,
            host = %record.host,
            path = %record.path,
            policy_id = record.policy_id,
            vuln_name = %record.vuln_name,
            action = record.action.as_str(),
            "Policy hit"
        );
    }
}

async fn write_json_lines(path: &Path, mut rx: mpsc::Receiver<PolicyHitRecord>) {
    let mut file = match open_append(path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to open audit log, falling back to tracing");
            log_to_tracing(rx).await;
            return;
        }
    };

    let mut dirty = false;
    loop {
        match tokio::time::timeout(FLUSH_INTERVAL, rx.recv()).await {
            Ok(Some(record)) => {
                let mut line = match serde_json::to_vec(&record) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize audit record");
                        continue;
                    }
                };
                line.push(b'\n');
                match file.write_all(&line).await {
                    Ok(()) => dirty = true,
                    Err(e) => tracing::error!(error = %e, "Failed to write audit record"),
                }
            }
            Ok(None) => {
                if dirty {
                    if let Err(e) = file.flush().await {
                        tracing::error!(error = %e, "Failed to flush audit log on shutdown");
                    }
                }
                tracing::debug!("Audit writer exiting");
                return;
            }
            Err(_) => {
                if dirty {
                    match file.flush().await {
                        Ok(()) => dirty = false,
                        Err(e) => tracing::error!(error = %e, "Periodic audit flush failed"),
                    }
                }
            }
        }
    }
}

async fn open_append(path: &Path) -> std::io::Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new().create(true).append(true).open(path).await
}
