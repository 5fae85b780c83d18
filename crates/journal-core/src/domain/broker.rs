//! 브로커 체결 조회 추상화.
//!
//! 브로커별 HTTP/인증 세부 사항은 커넥터 크레이트에 캡슐화되며,
//! 코어는 "커서 X 이후의 체결을 가져온다"는 능력만 소비합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::connection::{BrokerConnection, BrokerCredentials};
use super::execution::RawExecution;

/// 브로커 커넥터 에러.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 네트워크 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 브로커 인증 실패
    #[error("Broker authentication failed: {0}")]
    Authentication(String),

    /// 브로커 API 에러 (HTTP 상태 코드 보존)
    #[error("Broker API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 응답 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 요청 시간 초과
    #[error("Broker request timed out after {0}s")]
    Timeout(u64),

    /// 지원하지 않는 브로커
    #[error("Unsupported broker: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// 호출자 측 에러로 분류되는 HTTP 상태 코드 (4xx만).
    ///
    /// 브로커가 4xx를 반환한 경우 그 상태 코드를 보존하여
    /// 상위 레이어가 그대로 전달할 수 있게 합니다.
    pub fn client_status(&self) -> Option<u16> {
        match self {
            ProviderError::Authentication(_) => Some(401),
            ProviderError::Api { status, .. } if (400..500).contains(status) => Some(*status),
            _ => None,
        }
    }

    /// 재시도 가능 여부 (일시적 장애만).
    ///
    /// 네트워크 에러, 타임아웃, 5xx, 429는 재시도 대상입니다.
    /// 인증 실패와 그 외 4xx는 재시도해도 결과가 달라지지 않습니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// 브로커 체결 제공자 trait.
///
/// 동기화 엔진이 소비하는 유일한 브로커 인터페이스입니다.
/// 페이지네이션은 제공자 내부에서 순차 페이지 요청으로 처리하며,
/// 호출자에게는 전체 결과를 반환합니다.
#[async_trait]
pub trait BrokerProvider: Send + Sync {
    /// 커서 이후의 체결 조회.
    ///
    /// `since`가 `None`이면 전체 이력을 조회합니다. 체결 상태 필터링은
    /// 호출자(동기화 엔진)의 책임이며, 제공자는 브로커가 보고하는
    /// 모든 체결을 반환해도 됩니다.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Network`: 네트워크 연결 실패
    /// - `ProviderError::Authentication`: 브로커 인증 실패
    /// - `ProviderError::Api`: 브로커 API 에러 (상태 코드 보존)
    async fn fetch_executions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawExecution>, ProviderError>;

    /// 브로커 이름 (로깅/디버깅용).
    fn broker_name(&self) -> &str;
}

/// 브로커 제공자 팩토리 trait.
///
/// 커넥션과 복호화된 자격증명으로부터 적절한 커넥터를 생성합니다.
/// 자격증명 복호화는 호출 전에 완료되어 있어야 합니다.
#[async_trait]
pub trait BrokerProviderFactory: Send + Sync {
    /// 커넥션에 맞는 제공자 생성.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unsupported`: 등록되지 않은 `broker_id`
    /// - `ProviderError::Authentication`: 필수 자격증명 필드 누락
    async fn create(
        &self,
        connection: &BrokerConnection,
        credentials: &BrokerCredentials,
    ) -> Result<std::sync::Arc<dyn BrokerProvider>, ProviderError>;
}
