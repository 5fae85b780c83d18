//! API 에러 응답 타입.

use serde::Serialize;
use utoipa::ToSchema;

/// 실패 응답 본문.
///
/// 모든 에러 경로에서 동일한 형태를 사용합니다. `code`는 클라이언트가
/// 분기할 수 있는 기계용 식별자입니다.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    pub success: bool,
    /// 사용자용 에러 메시지
    pub error: String,
    /// 기계용 에러 코드 (예: "SYNC_IN_PROGRESS")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: Some(code.into()),
        }
    }
}
