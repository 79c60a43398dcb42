//! OS signal handling.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::registry::Registry;

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Reload the registry on every SIGHUP until shutdown. Replicas ignore the
/// signal; their registry follows the master.
#[cfg(unix)]
pub async fn reload_on_sighup(registry: Arc<Registry>, mut shutdown: broadcast::Receiver<()>) {
    let mut hangup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("Received SIGHUP");
                match registry.reload() {
                    Ok(version) => tracing::info!(version, "Registry reloaded"),
                    Err(e) => tracing::warn!(error = %e, "Registry reload skipped"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_sighup(_registry: Arc<Registry>, mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
}
