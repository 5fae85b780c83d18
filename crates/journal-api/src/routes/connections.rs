//! 커넥션 등록/조회 핸들러.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use journal_core::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, StoredCredentials, SyncRun,
};

use crate::auth::AuthUser;
use crate::error::ApiErrorResponse;
use crate::repository::{ConnectionRepository, SyncRunRepository};
use crate::state::AppState;

// ============================================================================
// DTO
// ============================================================================

/// 커넥션 등록 요청.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateConnectionRequest {
    /// 브로커 식별자 (예: "tradier", "mock")
    pub broker_id: String,
    /// 모의투자 계좌 여부
    #[serde(default)]
    pub is_paper: bool,
    /// 브로커 자격증명 (응답에는 절대 포함되지 않음)
    #[schema(value_type = Object)]
    pub credentials: BrokerCredentials,
}

/// 커넥션 요약 (자격증명 제외).
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionDto {
    pub id: Uuid,
    pub broker_id: String,
    pub is_paper: bool,
    pub status: String,
    pub status_message: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub total_trades_synced: i64,
    pub created_at: DateTime<Utc>,
}

impl From<BrokerConnection> for ConnectionDto {
    fn from(connection: BrokerConnection) -> Self {
        Self {
            id: connection.id,
            broker_id: connection.broker_id,
            is_paper: connection.is_paper,
            status: connection.status.to_string(),
            status_message: connection.status_message,
            last_sync_at: connection.last_sync_at,
            total_trades_synced: connection.total_trades_synced,
            created_at: connection.created_at,
        }
    }
}

/// 커넥션 등록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateConnectionResponse {
    pub success: bool,
    pub connection: ConnectionDto,
}

/// 커넥션 목록 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionsResponse {
    pub success: bool,
    pub connections: Vec<ConnectionDto>,
}

/// 동기화 실행 이력 한 건.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncRunDto {
    pub id: Uuid,
    pub trigger: String,
    pub status: String,
    pub trades_synced: i32,
    pub trades_skipped: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<SyncRun> for SyncRunDto {
    fn from(run: SyncRun) -> Self {
        Self {
            id: run.id,
            trigger: run.trigger.to_string(),
            status: run.status.to_string(),
            trades_synced: run.trades_synced,
            trades_skipped: run.trades_skipped,
            error_message: run.error_message,
            started_at: run.started_at,
            completed_at: run.completed_at,
        }
    }
}

/// 동기화 이력 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncRunsResponse {
    pub success: bool,
    pub runs: Vec<SyncRunDto>,
}

// ============================================================================
// 핸들러
// ============================================================================

/// 커넥션 등록.
///
/// 암호화 관리자가 설정되어 있으면 자격증명 전체를 AES-256-GCM으로
/// 암호화하여 저장하고, 없으면 레거시 평문 형식으로 저장합니다.
#[utoipa::path(
    post,
    path = "/api/v1/connections",
    tag = "connections",
    request_body = CreateConnectionRequest,
    responses(
        (status = 201, description = "커넥션 등록 성공", body = CreateConnectionResponse),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    )
)]
pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateConnectionRequest>,
) -> impl IntoResponse {
    if request.broker_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::with_code(
                "broker_id must not be empty",
                "INVALID_REQUEST",
            )),
        )
            .into_response();
    }
    if request.credentials.api_key.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::with_code(
                "credentials.api_key must not be empty",
                "INVALID_REQUEST",
            )),
        )
            .into_response();
    }

    let credentials = match build_stored_credentials(&state, &request.credentials) {
        Ok(credentials) => credentials,
        Err(message) => {
            error!(error = %message, "Failed to prepare credentials for storage");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::with_code(message, "CREDENTIAL_ERROR")),
            )
                .into_response();
        }
    };

    let connection = BrokerConnection {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        broker_id: request.broker_id.trim().to_lowercase(),
        is_paper: request.is_paper,
        credentials,
        status: ConnectionStatus::Idle,
        status_message: None,
        last_sync_at: None,
        total_trades_synced: 0,
        created_at: Utc::now(),
    };

    if let Err(e) = ConnectionRepository::insert(&state.db_pool, &connection).await {
        error!(error = %e, "Failed to insert connection");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::with_code(
                "Failed to register connection",
                "STORE_ERROR",
            )),
        )
            .into_response();
    }

    info!(
        connection_id = %connection.id,
        broker = %connection.broker_id,
        encrypted = state.encryptor.is_some(),
        "Connection registered"
    );

    (
        StatusCode::CREATED,
        Json(CreateConnectionResponse {
            success: true,
            connection: connection.into(),
        }),
    )
        .into_response()
}

/// 자격증명 저장 형식 결정.
fn build_stored_credentials(
    state: &AppState,
    credentials: &BrokerCredentials,
) -> Result<StoredCredentials, String> {
    match &state.encryptor {
        Some(encryptor) => {
            let (ciphertext, nonce) = encryptor
                .encrypt_json(credentials)
                .map_err(|e| format!("credential encryption failed: {}", e))?;
            Ok(StoredCredentials::Encrypted { ciphertext, nonce })
        }
        None => {
            let value = serde_json::to_value(credentials)
                .map_err(|e| format!("credential serialization failed: {}", e))?;
            Ok(StoredCredentials::Legacy(value))
        }
    }
}

/// 호출자의 커넥션 목록.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "connections",
    responses(
        (status = 200, description = "커넥션 목록", body = ConnectionsResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    )
)]
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> impl IntoResponse {
    match ConnectionRepository::list_for_user(&state.db_pool, user.user_id).await {
        Ok(connections) => (
            StatusCode::OK,
            Json(ConnectionsResponse {
                success: true,
                connections: connections.into_iter().map(ConnectionDto::from).collect(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list connections");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::with_code(
                    "Failed to list connections",
                    "STORE_ERROR",
                )),
            )
                .into_response()
        }
    }
}

/// 커넥션의 동기화 실행 이력 (최신순).
#[utoipa::path(
    get,
    path = "/api/v1/connections/{id}/sync-runs",
    tag = "connections",
    params(
        ("id" = Uuid, Path, description = "커넥션 ID")
    ),
    responses(
        (status = 200, description = "동기화 이력", body = SyncRunsResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 404, description = "커넥션 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    )
)]
pub async fn list_sync_runs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    // 소유자 검증: 타인 소유 커넥션은 존재 여부를 숨깁니다
    let owned = match ConnectionRepository::get(&state.db_pool, id).await {
        Ok(Some(connection)) => connection.user_id == user.user_id,
        Ok(None) => false,
        Err(e) => {
            error!(error = %e, "Failed to load connection");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::with_code(
                    "Failed to load connection",
                    "STORE_ERROR",
                )),
            )
                .into_response();
        }
    };
    if !owned {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse::with_code(
                format!("Connection not found: {}", id),
                "CONNECTION_NOT_FOUND",
            )),
        )
            .into_response();
    }

    match SyncRunRepository::list_for_connection(&state.db_pool, id, 50).await {
        Ok(runs) => (
            StatusCode::OK,
            Json(SyncRunsResponse {
                success: true,
                runs: runs.into_iter().map(SyncRunDto::from).collect(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list sync runs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::with_code(
                    "Failed to list sync runs",
                    "STORE_ERROR",
                )),
            )
                .into_response()
        }
    }
}
