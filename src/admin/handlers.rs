use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::error::ApiResult;
use crate::admin::AdminState;
use crate::config::schema::NodeRole;
use crate::models::Application;
use crate::registry::ApplicationUpdate;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub role: NodeRole,
    pub registry_version: u64,
    pub applications: usize,
    pub routed_domains: usize,
    pub pending_captchas: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ReloadResult {
    pub registry_version: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.registry.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        role: state.registry.role(),
        registry_version: snapshot.version(),
        applications: snapshot.applications().len(),
        routed_domains: snapshot.routes().len(),
        pending_captchas: state.captcha.len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

pub async fn list_applications(State(state): State<AdminState>) -> Json<Vec<Application>> {
    Json(
        state
            .registry
            .applications()
            .iter()
            .map(|app| app.as_ref().clone())
            .collect(),
    )
}

pub async fn update_application(
    State(state): State<AdminState>,
    Json(update): Json<ApplicationUpdate>,
) -> ApiResult<Json<Application>> {
    let app = state.registry.update(update)?;
    Ok(Json(app.as_ref().clone()))
}

pub async fn delete_application(State(state): State<AdminState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.registry.delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload(State(state): State<AdminState>) -> ApiResult<Json<ReloadResult>> {
    let registry_version = state.registry.reload()?;
    Ok(Json(ReloadResult { registry_version }))
}

/// Full application list pulled by replicas.
pub async fn replication_applications(State(state): State<AdminState>) -> Json<Vec<Application>> {
    list_applications(State(state)).await
}
