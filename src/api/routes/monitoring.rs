//! Monitoring endpoints, served on their own port
//!
//! - `GET /livez`  the process is up
//! - `GET /readyz` the store answers
//! - `GET /info`   build and instance information

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

use crate::domain::ServiceInstance;
use crate::storage::AccountStore;

/// State of the monitoring endpoints
#[derive(Clone)]
pub struct MonitoringState {
    pub store: AccountStore,
    pub instance: ServiceInstance,
}

/// Create the monitoring router
pub fn monitoring_router(state: MonitoringState) -> Router {
    Router::new()
        .route("/livez", get(handle_livez))
        .route("/readyz", get(handle_readyz))
        .route("/info", get(handle_info))
        .with_state(state)
}

async fn handle_livez() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn handle_readyz(State(state): State<MonitoringState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
        }
    }
}

async fn handle_info(State(state): State<MonitoringState>) -> impl IntoResponse {
    let instance = &state.instance;
    Json(json!({
        "name": instance.name,
        "version": instance.version.version,
        "commit": instance.version.short_hash(),
        "commit_date": instance.version.commit_date,
        "build_date": instance.version.build_date,
        "pid": instance.pid,
        "startup_time": instance.startup_time.to_rfc3339(),
    }))
}
