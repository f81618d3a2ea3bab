use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub storage_healthy: bool,
}

/// GET /health - Liveness with a storage check
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
	let storage_healthy = state.order_service.health_check().await.unwrap_or(false);
	let (code, status) = if storage_healthy {
		(StatusCode::OK, "ok")
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, "degraded")
	};
	(
		code,
		Json(HealthResponse {
			status,
			storage_healthy,
		}),
	)
}
