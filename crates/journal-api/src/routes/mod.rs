//! API 라우트.

pub mod connections;
pub mod sync;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// 헬스 체크.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "서버 정상", body = HealthResponse)
    )
)]
pub async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
    })
}

/// API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/connections",
            post(connections::create_connection).get(connections::list_connections),
        )
        .route(
            "/api/v1/connections/{id}/sync",
            post(sync::trigger_sync),
        )
        .route(
            "/api/v1/connections/{id}/sync-runs",
            get(connections::list_sync_runs),
        )
}
