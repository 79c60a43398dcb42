//! WAF reverse-proxy gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ listener (plain / TLS) ──▶ proxy handler
//!                                            │ registry: Host → Application
//!                                            │ selector: Application → destination
//!                                            ▼
//!                                        upstream client ──▶ Backend
//!                                            │
//!   Client ◀── enforcement pipeline ◀────────┘
//!              (response WAF, CAPTCHA, headers, static cache)
//!
//!   Background: replica sync | store watcher | SIGHUP reload
//!               captcha sweeper | audit writer | admin API | metrics
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use waf_gateway::admin::{setup_admin_router, AdminState};
use waf_gateway::captcha::CaptchaStore;
use waf_gateway::config::loader::load_or_default;
use waf_gateway::config::NodeRole;
use waf_gateway::http::{AppState, GatewayServer};
use waf_gateway::lifecycle::{signals, Shutdown};
use waf_gateway::observability::{logging, metrics};
use waf_gateway::registry::{Registry, ReplicaSync};
use waf_gateway::store::{MemoryStore, StoreWatcher};
use waf_gateway::waf::{HitLogger, PolicyEvaluator, RuleEvaluator};

#[derive(Parser)]
#[command(name = "waf-gateway")]
#[command(about = "Reverse-proxy gateway with response-side WAF enforcement", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(&args.config)?;

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        role = ?config.cluster.role,
        bind_address = %config.listener.bind_address,
        "waf-gateway starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();

    // Store and registry
    let store = Arc::new(match &config.store.data_path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => MemoryStore::new(None),
    });
    let registry = Arc::new(Registry::new(store.clone(), config.cluster.role));

    let mut _store_watcher = None;
    match config.cluster.role {
        NodeRole::Master => {
            let version = registry.reload()?;
            tracing::info!(version, applications = registry.applications().len(), "Registry loaded");

            tokio::spawn(signals::reload_on_sighup(registry.clone(), shutdown.subscribe()));

            if let (true, Some(path)) = (config.store.watch, &config.store.data_path) {
                let (watcher, mut reload_rx) = StoreWatcher::new(Path::new(path));
                _store_watcher = Some(watcher.run()?);

                let store = store.clone();
                let registry = registry.clone();
                let mut shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            notified = reload_rx.recv() => {
                                if notified.is_none() {
                                    break;
                                }
                                if let Err(e) = store.refresh_from_file() {
                                    tracing::warn!(error = %e, "Store data file unreadable, keeping current registry");
                                    continue;
                                }
                                match registry.reload() {
                                    Ok(version) => tracing::info!(version, "Registry reloaded from store"),
                                    Err(e) => tracing::warn!(error = %e, "Registry reload failed"),
                                }
                            }
                        }
                    }
                });
            }
        }
        NodeRole::Replica => {
            let sync = ReplicaSync::new(registry.clone(), config.cluster.clone(), config.admin.api_key.clone())?;
            tracing::info!(endpoint = %sync.endpoint(), "Replica sync enabled");
            tokio::spawn(sync.run(shutdown.subscribe()));
        }
    }

    // Enforcement collaborators
    let captcha = Arc::new(CaptchaStore::new(Duration::from_secs(config.gateway.captcha_ttl_secs)));
    {
        let captcha = captcha.clone();
        let interval = Duration::from_secs(config.gateway.captcha_sweep_secs.max(1));
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move { captcha.run_sweeper(interval, shutdown_rx).await });
    }

    let (hit_logger, hit_rx) = HitLogger::new(config.audit.channel_capacity);
    let audit_writer = HitLogger::spawn_writer(hit_rx, config.audit.path.as_ref().map(PathBuf::from));

    let evaluator: Arc<dyn PolicyEvaluator> = Arc::new(RuleEvaluator::from_config(&config.waf)?);
    let state = AppState::new(&config, registry.clone(), evaluator, hit_logger, captcha.clone())?;

    // Admin API
    if config.admin.enabled {
        let router = setup_admin_router(AdminState::new(registry.clone(), captcha.clone(), &config.admin.api_key));
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
    }

    // Gateway
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config.clone(), state);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let server_result = tokio::select! {
        _ = signals::wait_for_shutdown() => {
            shutdown.trigger();
            server_task.await
        }
        result = &mut server_task => {
            shutdown.trigger();
            result
        }
    };
    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Gateway server failed"),
        Err(e) => tracing::error!(error = %e, "Gateway server task panicked"),
    }

    if tokio::time::timeout(Duration::from_secs(5), audit_writer).await.is_err() {
        tracing::warn!("Audit writer did not drain before exit");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
