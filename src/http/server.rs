//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router and wire middleware (request ID, trace, limits)
//! - Serve the plain listener and, when configured, the TLS listener
//! - Resolve the application, select a destination, forward, enforce

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::captcha::CaptchaStore;
use crate::config::schema::{GatewayConfig, TlsConfig};
use crate::enforcement::{ResponseEnforcer, StaticCache};
use crate::http::request::{ClientTransport, RequestContext};
use crate::http::upstream::{UpstreamClient, UpstreamError};
use crate::load_balancer::{self, DestinationSelector};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::registry::Registry;
use crate::waf::{HitLogger, PolicyEvaluator};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub selector: Arc<dyn DestinationSelector>,
    pub upstream: UpstreamClient,
    pub enforcer: Arc<ResponseEnforcer>,
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<Registry>,
        evaluator: Arc<dyn PolicyEvaluator>,
        hit_logger: HitLogger,
        captcha: Arc<CaptchaStore>,
    ) -> Result<Self, UpstreamError> {
        let enforcer = ResponseEnforcer::new(
            &config.gateway,
            evaluator,
            hit_logger,
            captcha,
            StaticCache::new(&config.cache),
        );
        Ok(Self {
            registry,
            selector: Arc::from(load_balancer::from_strategy(config.gateway.selection)),
            upstream: UpstreamClient::new(&config.upstream)?,
            enforcer: Arc::new(enforcer),
            max_body_size: config.upstream.max_body_size,
        })
    }
}

/// The gateway's client-facing server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, state: AppState) -> Self {
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.upstream.request_timeout_secs),
            ))
            .layer(RequestBodyLimitLayer::new(config.upstream.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Router for one listener, tagged with its transport.
    pub fn router_for(&self, transport: ClientTransport) -> Router {
        self.router.clone().layer(Extension(transport))
    }

    /// Serve the plain listener (and the TLS listener when configured) until
    /// shutdown is signalled.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        let tls_task = match &self.config.listener.tls {
            Some(tls) => Some(self.spawn_tls(tls, shutdown.resubscribe()).await?),
            None => None,
        };

        tracing::info!(address = %addr, "Gateway listening");
        let app = self
            .router_for(ClientTransport::Plain)
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        if let Some(task) = tls_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "TLS listener failed"),
                Err(e) => tracing::error!(error = %e, "TLS listener task panicked"),
            }
        }

        tracing::info!("Gateway server stopped");
        Ok(())
    }

    async fn spawn_tls(
        &self,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<Result<(), std::io::Error>>, std::io::Error> {
        let addr: SocketAddr = tls
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        let app = self
            .router_for(ClientTransport::Tls)
            .into_make_service_with_connect_info::<SocketAddr>();
        tracing::info!(address = %addr, "Gateway listening (TLS)");
        Ok(tokio::spawn(async move {
            axum_server::bind_rustls(addr, rustls).handle(handle).serve(app).await
        }))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    Extension(transport): Extension<ClientTransport>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts, transport, peer);
    let method = ctx.method.to_string();

    tracing::debug!(
        request_id = %ctx.request_id(),
        method = %method,
        host = %ctx.host,
        path = %ctx.path(),
        "Proxying request"
    );

    // 1. Resolve application
    let Some(app) = state.registry.get_by_domain(&ctx.host) else {
        tracing::warn!(request_id = %ctx.request_id(), host = %ctx.host, "Unknown host");
        metrics::record_request(&method, 404, start_time);
        return (StatusCode::NOT_FOUND, "Unknown host").into_response();
    };

    if app.redirect_https && !ctx.is_tls() {
        metrics::record_request(&method, 301, start_time);
        return https_redirect(&ctx);
    }

    // 2. Select destination
    let destination = match state.selector.select(&app) {
        Ok(dest) => dest.destination.clone(),
        Err(e) => {
            tracing::warn!(request_id = %ctx.request_id(), app = app.id, error = %e, "No destination");
            metrics::record_request(&method, 502, start_time);
            return (StatusCode::BAD_GATEWAY, "No backend available").into_response();
        }
    };

    // 3. Forward
    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %ctx.request_id(), error = %e, "Request body rejected");
            metrics::record_request(&method, 413, start_time);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };
    let upstream = match state.upstream.forward(app.internal_scheme, &destination, &ctx, body).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %ctx.request_id(), app = app.id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    // 4. Enforce
    let response = state.enforcer.enforce(upstream, &ctx, &app).await;
    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

fn https_redirect(ctx: &RequestContext) -> Response {
    let location = format!("https://{}{}", ctx.host, ctx.target_url());
    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid host").into_response(),
    }
}
