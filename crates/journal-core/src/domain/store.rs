//! 영속성 콜라보레이터 trait.
//!
//! 동기화 엔진이 소비하는 저장소 인터페이스입니다. 실제 구현은
//! API 크레이트의 sqlx/Postgres 저장소이며, 테스트에서는 인메모리
//! 구현을 사용합니다.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::connection::{BrokerConnection, ConnectionStatus, SyncRun, SyncRunStatus};
use super::trade::CanonicalTrade;

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(String),

    /// 대상 행 없음
    #[error("Not found: {0}")]
    NotFound(String),
}

/// 체결-트레이드 링크 행.
///
/// 커넥션 단위 dedup 불변식의 근거 테이블입니다:
/// 동일 커넥션에서 같은 체결 ID가 두 번 트레이드로 이어질 수 없습니다.
#[derive(Debug, Clone)]
pub struct ExecutionLink {
    /// 커넥션 ID
    pub connection_id: Uuid,
    /// 생성된 트레이드 ID
    pub trade_id: Uuid,
    /// 브로커 체결 ID
    pub execution_id: String,
}

/// 트레이드 저널 영속성 trait.
///
/// 메서드 단위는 의도적으로 좁게 유지합니다. 엔진은 이 trait만 알며,
/// 트랜잭션 경계나 advisory lock 같은 강화는 구현 쪽에서 레이어링할 수
/// 있습니다.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// 커넥션 조회.
    async fn get_connection(&self, id: Uuid) -> Result<Option<BrokerConnection>, StoreError>;

    /// 커넥션 상태 전이 (에러 메시지 포함 가능).
    async fn update_connection_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// 성공 동기화 마감: `connected` 전이, 커서 전진, 누적 카운터 증가.
    ///
    /// `last_sync_at`은 앞으로만 전진해야 합니다 (기존 값보다 과거의
    /// 타임스탬프는 무시).
    async fn complete_connection_sync(
        &self,
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        new_trades: i64,
    ) -> Result<(), StoreError>;

    /// `running` 상태의 SyncRun 삽입.
    async fn insert_sync_run(&self, run: &SyncRun) -> Result<(), StoreError>;

    /// SyncRun 종결 (`running → success|error` 전이만 허용).
    async fn complete_sync_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        trades_synced: i32,
        trades_skipped: i32,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// 트레이드 일괄 삽입 (주 테이블, 실패는 실행에 치명적).
    async fn insert_trades(&self, trades: &[CanonicalTrade]) -> Result<(), StoreError>;

    /// 주어진 체결 ID 중 이미 링크된 것 조회 (dedup 패스).
    ///
    /// 조회 범위는 새로 가져온 체결 ID 집합으로 한정됩니다.
    async fn find_linked_execution_ids(
        &self,
        connection_id: Uuid,
        execution_ids: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    /// 체결-트레이드 링크 삽입 (보조 테이블, 실패는 비치명적).
    async fn insert_execution_links(&self, links: &[ExecutionLink]) -> Result<(), StoreError>;
}
