//! 커넥션 단위 동기화 엔진.
//!
//! 한 번의 동기화 실행은 fetch → filter → dedup → pair → persist의
//! 순차 파이프라인이며, 커넥션 상태 머신(`idle → syncing →
//! {connected, error}`)과 실행 기록(SyncRun)을 함께 관리합니다.
//!
//! # 실패 의미론
//!
//! - 브로커 fetch 에러와 주 트레이드 테이블 쓰기 에러는 해당 실행에만
//!   치명적입니다 (커넥션은 다음 수동 동기화에 재사용 가능).
//! - 링크 테이블 쓰기 에러는 비치명적입니다: 경고만 남기고 실행은
//!   성공으로 보고합니다. 트레이드는 보조 테이블 실패로 롤백되지
//!   않습니다.
//! - 어떤 실패 경로에서도 커넥션이 `syncing`에 머물러서는 안 됩니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crypto::CredentialEncryptor;
use crate::domain::broker::{BrokerProvider, BrokerProviderFactory, ProviderError};
use crate::domain::connection::{
    BrokerConnection, BrokerCredentials, ConnectionStatus, StoredCredentials, SyncRun,
    SyncRunStatus, SyncTrigger,
};
use crate::domain::instrument::InstrumentRegistry;
use crate::domain::pairing::pair_executions;
use crate::domain::store::{ExecutionLink, StoreError, TradeStore};

/// 동기화 엔진 설정.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 브로커 fetch 전체에 대한 벽시계 예산.
    ///
    /// 초과 시 `ProviderError::Timeout`으로 처리되어 실행과 커넥션이
    /// `error`로 마감됩니다 (`syncing` 고착 방지).
    pub fetch_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(120),
        }
    }
}

impl SyncConfig {
    /// 환경변수에서 설정 로드 (`SYNC_FETCH_TIMEOUT_SECS`).
    pub fn from_env() -> Self {
        let secs = std::env::var("SYNC_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);
        Self {
            fetch_timeout: Duration::from_secs(secs),
        }
    }
}

/// 동기화 실행 결과 보고.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// 이번 실행에서 가져온 트레이드 수
    pub trades_imported: i32,
    /// 건너뛴 체결 수 (dedup, 미체결 상태, 미매칭 leg)
    pub trades_skipped: i32,
    /// 사용자용 요약 메시지
    pub message: String,
}

/// 동기화 에러.
///
/// fetch/persist 경계의 모든 에러는 엔진에서 정확히 한 번 잡혀
/// 영속 상태(SyncRun + 커넥션)에 기록된 뒤 호출자에게 재전파됩니다.
#[derive(Debug, Error)]
pub enum SyncError {
    /// 커넥션이 없거나 호출자 소유가 아님
    #[error("Connection not found: {0}")]
    ConnectionNotFound(Uuid),

    /// 동일 커넥션에 이미 진행 중인 동기화가 있음
    #[error("Sync already in progress for connection {0}")]
    SyncInProgress(Uuid),

    /// 자격증명 복호화/해석 실패
    #[error("Credential error: {0}")]
    Credential(String),

    /// 브로커 fetch 실패 (4xx 상태 코드 보존)
    #[error("Broker error: {0}")]
    Broker(#[from] ProviderError),

    /// 주 테이블 영속성 실패
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// 실행 내부 통계.
struct RunStats {
    imported: i32,
    skipped: i32,
}

/// 동기화 엔진.
///
/// 콜라보레이터(저장소, 브로커 팩토리, 암호화 관리자, 상품 레지스트리)를
/// 주입받아 커넥션 단위 동기화를 수행합니다. 서로 다른 커넥션에 대한
/// 호출은 동시에 실행해도 안전합니다.
pub struct SyncEngine {
    store: Arc<dyn TradeStore>,
    factory: Arc<dyn BrokerProviderFactory>,
    registry: Arc<InstrumentRegistry>,
    encryptor: Option<Arc<CredentialEncryptor>>,
    config: SyncConfig,
}

impl SyncEngine {
    /// 새 엔진 생성.
    pub fn new(
        store: Arc<dyn TradeStore>,
        factory: Arc<dyn BrokerProviderFactory>,
        registry: Arc<InstrumentRegistry>,
    ) -> Self {
        Self {
            store,
            factory,
            registry,
            encryptor: None,
            config: SyncConfig::default(),
        }
    }

    /// 암호화 관리자 설정.
    ///
    /// 없으면 암호화 형식 자격증명을 가진 커넥션의 동기화가
    /// `SyncError::Credential`로 실패합니다 (레거시 형식은 계속 동작).
    pub fn with_encryptor(mut self, encryptor: Arc<CredentialEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// 설정 교체.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// 커넥션 한 건 동기화.
    ///
    /// 프로토콜:
    /// 1. 커넥션 조회 + 소유자 검증
    /// 2. `syncing` 선점 검사 (진행 중이면 거부)
    /// 3. 자격증명 해석 (암호화/레거시 형식 모두 지원)
    /// 4. `syncing` 전이를 네트워크 호출 전에 먼저 영속화
    /// 5. `running` SyncRun 삽입
    /// 6. fetch → filter → dedup → pair → persist
    /// 7. 성공/실패에 따라 SyncRun과 커넥션 마감
    ///
    /// # Errors
    ///
    /// 실패는 영속 상태에 기록된 후 재전파됩니다. 0건 동기화는
    /// 에러가 아니라 정상 결과입니다.
    pub async fn sync_connection(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        trigger: SyncTrigger,
    ) -> Result<SyncReport, SyncError> {
        // 1. 커넥션 조회 + 소유자 검증 (타인 소유는 존재 여부를 숨김)
        let connection = self
            .store
            .get_connection(connection_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or(SyncError::ConnectionNotFound(connection_id))?;

        // 2. 진행 중 동기화 거부: status 필드가 커넥션 단위 상호 배제 신호
        if connection.status == ConnectionStatus::Syncing {
            warn!(
                connection_id = %connection_id,
                "Rejecting sync request: already in progress"
            );
            return Err(SyncError::SyncInProgress(connection_id));
        }

        // 3. 자격증명은 실행 시작 시점에 한 번만 해석
        let credentials = self.resolve_credentials(&connection)?;
        let provider = self.factory.create(&connection, &credentials).await?;

        info!(
            connection_id = %connection_id,
            broker = provider.broker_name(),
            trigger = %trigger,
            cursor = ?connection.last_sync_at,
            "Starting sync run"
        );

        // 4. 네트워크 호출 전에 syncing 상태를 먼저 영속화
        //    (동시 관찰자가 진행 중 상태를 볼 수 있도록)
        self.store
            .update_connection_status(connection_id, ConnectionStatus::Syncing, None)
            .await?;

        // 5. running 상태의 실행 기록 삽입
        let run = SyncRun::started(connection_id, trigger);
        if let Err(e) = self.store.insert_sync_run(&run).await {
            // 실행 기록조차 남기지 못하면 syncing 고착을 풀고 중단
            let msg = e.to_string();
            self.mark_connection_error(connection_id, &msg).await;
            return Err(e.into());
        }

        // 6. 파이프라인 실행, 7. 결과에 따라 마감
        match self.execute_run(&connection, provider.as_ref()).await {
            Ok(stats) => {
                // 마감 단계의 저장소 실패도 커넥션을 error로 전이시켜야
                // syncing 고착이 생기지 않습니다
                if let Err(e) = self
                    .store
                    .complete_sync_run(
                        run.id,
                        SyncRunStatus::Success,
                        stats.imported,
                        stats.skipped,
                        None,
                    )
                    .await
                {
                    let msg = e.to_string();
                    self.mark_connection_error(connection_id, &msg).await;
                    return Err(e.into());
                }
                if let Err(e) = self
                    .store
                    .complete_connection_sync(connection_id, Utc::now(), stats.imported as i64)
                    .await
                {
                    let msg = e.to_string();
                    self.mark_connection_error(connection_id, &msg).await;
                    return Err(e.into());
                }

                let message = if stats.imported == 0 {
                    format!("No new trades ({} executions skipped)", stats.skipped)
                } else {
                    format!(
                        "Imported {} trades ({} executions skipped)",
                        stats.imported, stats.skipped
                    )
                };
                info!(
                    connection_id = %connection_id,
                    imported = stats.imported,
                    skipped = stats.skipped,
                    "Sync run completed"
                );
                Ok(SyncReport {
                    trades_imported: stats.imported,
                    trades_skipped: stats.skipped,
                    message,
                })
            }
            Err(e) => {
                // 에러는 여기서 정확히 한 번 기록하고 재전파
                let msg = e.to_string();
                if let Err(store_err) = self
                    .store
                    .complete_sync_run(run.id, SyncRunStatus::Error, 0, 0, Some(&msg))
                    .await
                {
                    warn!(
                        connection_id = %connection_id,
                        error = %store_err,
                        "Failed to record sync run failure"
                    );
                }
                self.mark_connection_error(connection_id, &msg).await;
                Err(e)
            }
        }
    }

    /// fetch → filter → dedup → pair → persist 파이프라인.
    async fn execute_run(
        &self,
        connection: &BrokerConnection,
        provider: &dyn BrokerProvider,
    ) -> Result<RunStats, SyncError> {
        // fetch: 커서가 있으면 그 이후만, 없으면 전체 이력.
        // 타임스탬프 커서가 유일한 증분 동기화 수단입니다.
        let timeout_secs = self.config.fetch_timeout.as_secs();
        let fetched = tokio::time::timeout(
            self.config.fetch_timeout,
            provider.fetch_executions(connection.last_sync_at),
        )
        .await
        .map_err(|_| ProviderError::Timeout(timeout_secs))??;

        let fetched_count = fetched.len();
        debug!(
            connection_id = %connection.id,
            fetched = fetched_count,
            "Fetched executions from broker"
        );

        // filter: 전량 체결만 페어링 대상
        let filled: Vec<_> = fetched
            .into_iter()
            .filter(|e| e.status.is_filled())
            .collect();

        // dedup: 이미 링크된 체결 제외 (커서 경계 재조회 보호).
        // 조회 범위는 이번에 가져온 체결 ID로 한정합니다.
        let execution_ids: Vec<String> =
            filled.iter().map(|e| e.execution_id.clone()).collect();
        let linked = if execution_ids.is_empty() {
            Default::default()
        } else {
            self.store
                .find_linked_execution_ids(connection.id, &execution_ids)
                .await?
        };
        let fresh: Vec<_> = filled
            .into_iter()
            .filter(|e| !linked.contains(&e.execution_id))
            .collect();

        if !linked.is_empty() {
            debug!(
                connection_id = %connection.id,
                deduplicated = linked.len(),
                "Skipping previously imported executions"
            );
        }

        // pair: 방향성 FIFO 매칭
        let trades = pair_executions(connection.user_id, &fresh, self.registry.as_ref());
        let imported = trades.len() as i32;
        let skipped = fetched_count as i32 - imported * 2;

        // 0건은 정상 결과: 아무것도 없었거나, 전부 dedup되었거나,
        // 페어링 결과가 없는 경우
        if trades.is_empty() {
            return Ok(RunStats {
                imported: 0,
                skipped,
            });
        }

        // persist: 주 테이블 실패는 치명적
        self.store.insert_trades(&trades).await?;

        // 링크 테이블 실패는 비치명적: 트레이드 가져오기는 이미 성공
        let links: Vec<ExecutionLink> = trades
            .iter()
            .flat_map(|trade| {
                trade
                    .execution_ids()
                    .into_iter()
                    .map(|execution_id| ExecutionLink {
                        connection_id: connection.id,
                        trade_id: trade.id,
                        execution_id: execution_id.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        if let Err(e) = self.store.insert_execution_links(&links).await {
            warn!(
                connection_id = %connection.id,
                error = %e,
                "Failed to record execution links; trades were imported successfully"
            );
        }

        Ok(RunStats { imported, skipped })
    }

    /// 자격증명 해석: 암호화 형식 또는 레거시 평문 형식.
    fn resolve_credentials(
        &self,
        connection: &BrokerConnection,
    ) -> Result<BrokerCredentials, SyncError> {
        match &connection.credentials {
            StoredCredentials::Encrypted { ciphertext, nonce } => {
                let encryptor = self.encryptor.as_deref().ok_or_else(|| {
                    SyncError::Credential(
                        "encrypted credentials present but no encryptor configured".to_string(),
                    )
                })?;
                encryptor.decrypt_json(ciphertext, nonce).map_err(|e| {
                    SyncError::Credential(format!("failed to decrypt credentials: {}", e))
                })
            }
            StoredCredentials::Legacy(value) => {
                serde_json::from_value(value.clone()).map_err(|e| {
                    SyncError::Credential(format!("invalid legacy credentials: {}", e))
                })
            }
        }
    }

    /// 커넥션을 `error`로 전이 (실패 경로의 best-effort 마감).
    async fn mark_connection_error(&self, connection_id: Uuid, message: &str) {
        if let Err(e) = self
            .store
            .update_connection_status(connection_id, ConnectionStatus::Error, Some(message))
            .await
        {
            warn!(
                connection_id = %connection_id,
                error = %e,
                "Failed to mark connection as errored"
            );
        }
    }
}
