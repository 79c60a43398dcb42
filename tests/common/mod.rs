//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use waf_gateway::captcha::CaptchaStore;
use waf_gateway::config::{GatewayConfig, NodeRole, ResponseRuleConfig};
use waf_gateway::http::{AppState, GatewayServer};
use waf_gateway::models::{Application, Destination, Domain};
use waf_gateway::registry::Registry;
use waf_gateway::store::MemoryStore;
use waf_gateway::waf::{HitLogger, PolicyEvaluator, PolicyHitRecord, RuleEvaluator};
use waf_gateway::Shutdown;

/// Canned backend reply.
pub struct MockResponse {
    pub status: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: "200 OK",
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Start a mock backend on an ephemeral port. `respond` receives the raw
/// request head.
pub async fn start_backend<F>(respond: F) -> SocketAddr
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }

                let reply = respond(&String::from_utf8_lossy(&head));
                let mut raw = format!("HTTP/1.1 {}\r\n", reply.status);
                for (name, value) in &reply.headers {
                    raw.push_str(&format!("{}: {}\r\n", name, value));
                }
                raw.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.body.len(),
                    reply.body
                ));
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Application routed from `host` to `backend`.
pub fn application(id: i64, host: &str, backend: Option<SocketAddr>) -> Application {
    let mut app = Application::new(id, format!("app-{}", id));
    app.domains.push(Domain {
        id,
        app_id: id,
        name: host.to_string(),
    });
    if let Some(backend) = backend {
        app.destinations.push(Destination {
            id,
            app_id: id,
            destination: backend.to_string(),
            node_id: 0,
        });
    }
    app
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub registry: Arc<Registry>,
    pub captcha: Arc<CaptchaStore>,
    pub hits: mpsc::Receiver<PolicyHitRecord>,
    shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(apps: Vec<Application>, rules: Vec<ResponseRuleConfig>) -> TestGateway {
    let mut config = GatewayConfig::default();
    config.cache.enabled = false;
    config.waf.response_rules = rules;

    let registry = Arc::new(Registry::new(Arc::new(MemoryStore::new(None)), NodeRole::Master));
    registry.replace_all(apps);

    let captcha = Arc::new(CaptchaStore::new(std::time::Duration::from_secs(600)));
    let (hit_logger, hits) = HitLogger::new(16);
    let evaluator: Arc<dyn PolicyEvaluator> = Arc::new(RuleEvaluator::from_config(&config.waf).unwrap());
    let state = AppState::new(&config, registry.clone(), evaluator, hit_logger, captcha.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config, state);
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        registry,
        captcha,
        hits,
        shutdown,
    }
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
