//! 동기화 트리거 핸들러.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use journal_core::{SyncError, SyncTrigger};

use crate::auth::AuthUser;
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 동기화 성공 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub success: bool,
    /// 이번 실행에서 가져온 트레이드 수
    pub trades_imported: i32,
    /// 건너뛴 체결 수 (dedup, 미체결 상태, 미매칭 leg)
    pub trades_skipped: i32,
    pub message: String,
}

/// 커넥션 수동 동기화.
///
/// 브로커에서 체결을 가져와 라운드트립 트레이드로 재구성합니다.
/// 이미 진행 중인 동기화가 있으면 409를 반환합니다.
#[utoipa::path(
    post,
    path = "/api/v1/connections/{id}/sync",
    tag = "sync",
    params(
        ("id" = Uuid, Path, description = "커넥션 ID")
    ),
    responses(
        (status = 200, description = "동기화 성공 (0건 포함)", body = SyncResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 404, description = "커넥션 없음", body = ApiErrorResponse),
        (status = 409, description = "동기화 진행 중", body = ApiErrorResponse),
        (status = 422, description = "자격증명 복호화/해석 불가", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse),
        (status = 502, description = "브로커 오류", body = ApiErrorResponse)
    )
)]
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state
        .engine
        .sync_connection(user.user_id, id, SyncTrigger::Manual)
        .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(SyncResponse {
                success: true,
                trades_imported: report.trades_imported,
                trades_skipped: report.trades_skipped,
                message: report.message,
            }),
        )
            .into_response(),
        Err(e) => sync_error_response(e).into_response(),
    }
}

/// 동기화 에러를 HTTP 응답으로 변환.
///
/// 브로커가 반환한 4xx 상태 코드는 그대로 전달합니다.
fn sync_error_response(error: SyncError) -> (StatusCode, Json<ApiErrorResponse>) {
    let (status, code) = match &error {
        SyncError::ConnectionNotFound(_) => (StatusCode::NOT_FOUND, "CONNECTION_NOT_FOUND"),
        SyncError::SyncInProgress(_) => (StatusCode::CONFLICT, "SYNC_IN_PROGRESS"),
        // 저장된 자격증명이 복호화/해석 불가능한 것은 호출자 데이터 문제
        SyncError::Credential(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CREDENTIAL_ERROR"),
        SyncError::Broker(provider_error) => {
            let status = provider_error
                .client_status()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, "BROKER_ERROR")
        }
        SyncError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
    };

    if status.is_server_error() {
        error!(error = %error, "Sync request failed");
    }

    (
        status,
        Json(ApiErrorResponse::with_code(error.to_string(), code)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use journal_core::ProviderError;

    #[test]
    fn test_sync_error_status_mapping() {
        let (status, _) = sync_error_response(SyncError::ConnectionNotFound(Uuid::new_v4()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = sync_error_response(SyncError::SyncInProgress(Uuid::new_v4()));
        assert_eq!(status, StatusCode::CONFLICT);

        // 자격증명 에러는 4xx 범위
        let (status, _) = sync_error_response(SyncError::Credential(
            "invalid legacy credentials".to_string(),
        ));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        // 브로커 4xx는 그대로 전달
        let (status, _) = sync_error_response(SyncError::Broker(ProviderError::Api {
            status: 429,
            message: "rate limited".to_string(),
        }));
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        // 브로커 5xx와 네트워크 에러는 502
        let (status, _) = sync_error_response(SyncError::Broker(ProviderError::Network(
            "refused".to_string(),
        )));
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = sync_error_response(SyncError::Broker(ProviderError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
