//! WAF reverse-proxy gateway library.

pub mod admin;
pub mod captcha;
pub mod config;
pub mod enforcement;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod models;
pub mod net;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod routing;
pub mod store;
pub mod waf;

/// Product name shown on block pages and in default config.
pub const PRODUCT_NAME: &str = "WAF-Gateway";

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
