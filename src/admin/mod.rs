//! Admin and replication API.
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::captcha::CaptchaStore;
use crate::registry::{Registry, REPLICATION_PATH};

pub use error::{ApiError, ApiResult};

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<Registry>,
    pub captcha: Arc<CaptchaStore>,
    pub api_key: Arc<str>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(registry: Arc<Registry>, captcha: Arc<CaptchaStore>, api_key: &str) -> Self {
        Self {
            registry,
            captcha,
            api_key: Arc::from(api_key),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/applications", get(list_applications).post(update_application))
        .route("/admin/applications/{id}", delete(delete_application))
        .route("/admin/reload", post(reload))
        .route(REPLICATION_PATH, get(replication_applications))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
