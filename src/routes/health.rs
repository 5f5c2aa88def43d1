use axum::{Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::services::error::{ApiError, LogErr};
use crate::services::response::ApiResponse;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/healthcheck", get(healthcheck))
}

/// GET /healthcheck
async fn healthcheck(State(state): State<Arc<AppState>>) -> Result<ApiResponse<Health>, ApiError> {
    state.store.ping().await.log_500("health check ping failed")?;
    Ok(ApiResponse::ok(Health { status: "OK" }, "Service is healthy"))
}
