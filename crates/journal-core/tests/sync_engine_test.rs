//! 동기화 엔진 통합 테스트.
//!
//! 인메모리 저장소와 스크립트된 브로커 제공자로 엔진의 상태 전이,
//! dedup, 비치명적 링크 실패, 에러 기록을 검증합니다.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use journal_core::{
    BrokerConnection, BrokerCredentials, BrokerProvider, BrokerProviderFactory, ConnectionStatus,
    ExecutionLink, ExecutionStatus, InstrumentRegistry, ProviderError, RawExecution, Side,
    StoreError, StoredCredentials, SyncEngine, SyncError, SyncRun, SyncRunStatus, SyncTrigger,
    TradeStore,
};

// ===== 테스트 더블 =====

#[derive(Default)]
struct MemoryState {
    connections: HashMap<Uuid, BrokerConnection>,
    sync_runs: Vec<SyncRun>,
    trades: usize,
    links: Vec<ExecutionLink>,
}

/// 인메모리 저장소.
struct MemoryTradeStore {
    state: Mutex<MemoryState>,
    fail_links: AtomicBool,
    fail_trades: AtomicBool,
    fail_finalize: AtomicBool,
}

impl MemoryTradeStore {
    fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            fail_links: AtomicBool::new(false),
            fail_trades: AtomicBool::new(false),
            fail_finalize: AtomicBool::new(false),
        }
    }

    fn add_connection(&self, connection: BrokerConnection) {
        self.state
            .lock()
            .unwrap()
            .connections
            .insert(connection.id, connection);
    }

    fn connection(&self, id: Uuid) -> BrokerConnection {
        self.state.lock().unwrap().connections[&id].clone()
    }

    fn runs(&self) -> Vec<SyncRun> {
        self.state.lock().unwrap().sync_runs.clone()
    }

    fn trade_count(&self) -> usize {
        self.state.lock().unwrap().trades
    }

    fn link_count(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn get_connection(&self, id: Uuid) -> Result<Option<BrokerConnection>, StoreError> {
        Ok(self.state.lock().unwrap().connections.get(&id).cloned())
    }

    async fn update_connection_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let conn = state
            .connections
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conn.status = status;
        conn.status_message = message.map(|s| s.to_string());
        Ok(())
    }

    async fn complete_connection_sync(
        &self,
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        new_trades: i64,
    ) -> Result<(), StoreError> {
        if self.fail_finalize.load(Ordering::SeqCst) {
            return Err(StoreError::Database(
                "connections table unavailable".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        let conn = state
            .connections
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conn.status = ConnectionStatus::Connected;
        conn.status_message = None;
        conn.last_sync_at = match conn.last_sync_at {
            Some(prev) if prev > last_sync_at => Some(prev),
            _ => Some(last_sync_at),
        };
        conn.total_trades_synced += new_trades;
        Ok(())
    }

    async fn insert_sync_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        self.state.lock().unwrap().sync_runs.push(run.clone());
        Ok(())
    }

    async fn complete_sync_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        trades_synced: i32,
        trades_skipped: i32,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .sync_runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        run.status = status;
        run.trades_synced = trades_synced;
        run.trades_skipped = trades_skipped;
        run.error_message = error_message.map(|s| s.to_string());
        run.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn insert_trades(
        &self,
        trades: &[journal_core::CanonicalTrade],
    ) -> Result<(), StoreError> {
        if self.fail_trades.load(Ordering::SeqCst) {
            return Err(StoreError::Database("trades table unavailable".to_string()));
        }
        self.state.lock().unwrap().trades += trades.len();
        Ok(())
    }

    async fn find_linked_execution_ids(
        &self,
        connection_id: Uuid,
        execution_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let wanted: HashSet<&String> = execution_ids.iter().collect();
        Ok(self
            .state
            .lock()
            .unwrap()
            .links
            .iter()
            .filter(|l| l.connection_id == connection_id && wanted.contains(&l.execution_id))
            .map(|l| l.execution_id.clone())
            .collect())
    }

    async fn insert_execution_links(&self, links: &[ExecutionLink]) -> Result<(), StoreError> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Database("link table unavailable".to_string()));
        }
        self.state.lock().unwrap().links.extend_from_slice(links);
        Ok(())
    }
}

/// 고정된 체결 목록을 반환하는 제공자.
struct ScriptedProvider {
    executions: Vec<RawExecution>,
    error: Option<fn() -> ProviderError>,
}

#[async_trait]
impl BrokerProvider for ScriptedProvider {
    async fn fetch_executions(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawExecution>, ProviderError> {
        if let Some(make_error) = self.error {
            return Err(make_error());
        }
        Ok(self.executions.clone())
    }

    fn broker_name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedFactory {
    provider: Arc<ScriptedProvider>,
}

#[async_trait]
impl BrokerProviderFactory for ScriptedFactory {
    async fn create(
        &self,
        _connection: &BrokerConnection,
        _credentials: &BrokerCredentials,
    ) -> Result<Arc<dyn BrokerProvider>, ProviderError> {
        Ok(self.provider.clone())
    }
}

// ===== 픽스처 =====

fn legacy_connection(user_id: Uuid) -> BrokerConnection {
    BrokerConnection {
        id: Uuid::new_v4(),
        user_id,
        broker_id: "scripted".to_string(),
        is_paper: true,
        credentials: StoredCredentials::Legacy(serde_json::json!({
            "api_key": "test-token",
            "account_id": "ACC-1"
        })),
        status: ConnectionStatus::Idle,
        status_message: None,
        last_sync_at: None,
        total_trades_synced: 0,
        created_at: Utc::now(),
    }
}

fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 14, minute, 0).unwrap()
}

/// ES 라운드트립 한 쌍 (매수 → 매도, 4포인트 수익).
fn round_trip_executions() -> Vec<RawExecution> {
    vec![
        RawExecution::new("e1", "o1", "ES", Side::Buy, dec!(2), dec!(5000.00), ts(0)),
        RawExecution::new("e2", "o2", "ES", Side::Sell, dec!(2), dec!(5004.00), ts(5)),
    ]
}

fn engine_with(
    store: Arc<MemoryTradeStore>,
    provider: ScriptedProvider,
) -> SyncEngine {
    SyncEngine::new(
        store,
        Arc::new(ScriptedFactory {
            provider: Arc::new(provider),
        }),
        Arc::new(InstrumentRegistry::builtin()),
    )
}

// ===== 테스트 =====

#[tokio::test]
async fn test_first_sync_imports_round_trip() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let report = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.trades_imported, 1);
    assert_eq!(report.trades_skipped, 0);
    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.link_count(), 2);

    let conn = store.connection(connection_id);
    assert_eq!(conn.status, ConnectionStatus::Connected);
    assert_eq!(conn.total_trades_synced, 1);
    assert!(conn.last_sync_at.is_some());

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncRunStatus::Success);
    assert_eq!(runs[0].trades_synced, 1);
    assert!(runs[0].completed_at.is_some());
}

#[tokio::test]
async fn test_second_sync_is_idempotent() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);

    // 커서를 무시하고 동일 체결을 재반환하는 제공자:
    // dedup만이 중복 가져오기를 막아야 합니다.
    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let first = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(first.trades_imported, 1);

    let second = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(second.trades_imported, 0);
    assert_eq!(second.trades_skipped, 2);
    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.link_count(), 2);

    // 두 번째 실행도 성공으로 기록됩니다 (0건은 정상 결과)
    let runs = store.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].status, SyncRunStatus::Success);
    assert_eq!(runs[1].trades_synced, 0);
}

#[tokio::test]
async fn test_zero_execution_sync_succeeds() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: vec![],
            error: None,
        },
    );

    let report = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.trades_imported, 0);
    assert_eq!(report.trades_skipped, 0);

    let conn = store.connection(connection_id);
    assert_eq!(conn.status, ConnectionStatus::Connected);
    assert!(conn.last_sync_at.is_some());
}

#[tokio::test]
async fn test_unfilled_executions_are_skipped() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);

    let mut executions = round_trip_executions();
    let mut canceled =
        RawExecution::new("e3", "o3", "ES", Side::Buy, dec!(1), dec!(5001.00), ts(1));
    canceled.status = ExecutionStatus::Canceled;
    executions.push(canceled);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions,
            error: None,
        },
    );

    let report = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();

    assert_eq!(report.trades_imported, 1);
    assert_eq!(report.trades_skipped, 1);
}

#[tokio::test]
async fn test_link_failure_is_non_fatal() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);
    store.fail_links.store(true, Ordering::SeqCst);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let report = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();

    // 트레이드는 들어가고 링크 실패는 경고로만 처리
    assert_eq!(report.trades_imported, 1);
    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.link_count(), 0);
    assert_eq!(
        store.connection(connection_id).status,
        ConnectionStatus::Connected
    );
    assert_eq!(store.runs()[0].status, SyncRunStatus::Success);
}

#[tokio::test]
async fn test_trade_insert_failure_is_fatal() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);
    store.fail_trades.store(true, Ordering::SeqCst);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let result = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await;

    assert!(matches!(result, Err(SyncError::Store(_))));

    let conn = store.connection(connection_id);
    assert_eq!(conn.status, ConnectionStatus::Error);
    assert!(conn.status_message.is_some());
    assert!(conn.last_sync_at.is_none());

    let runs = store.runs();
    assert_eq!(runs[0].status, SyncRunStatus::Error);
    assert!(runs[0].error_message.is_some());
}

#[tokio::test]
async fn test_finalize_failure_releases_syncing() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);
    store.fail_finalize.store(true, Ordering::SeqCst);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let result = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await;
    assert!(matches!(result, Err(SyncError::Store(_))));

    // 파이프라인 성공 후 커넥션 마감이 실패해도 syncing에 고착되지 않고
    // error로 전이되어 다음 수동 동기화가 가능해야 합니다
    let conn = store.connection(connection_id);
    assert_eq!(conn.status, ConnectionStatus::Error);
    assert!(conn.status_message.is_some());
    assert!(conn.last_sync_at.is_none());

    // 트레이드는 이미 들어갔고 실행 기록은 성공으로 마감된 상태
    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.runs()[0].status, SyncRunStatus::Success);

    // dedup 링크가 남아 있으므로 재시도는 중복을 가져오지 않습니다
    store.fail_finalize.store(false, Ordering::SeqCst);
    let retry = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(retry.trades_imported, 0);
    assert_eq!(store.trade_count(), 1);
    assert_eq!(
        store.connection(connection_id).status,
        ConnectionStatus::Connected
    );
}

#[tokio::test]
async fn test_sync_in_progress_is_rejected() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let mut connection = legacy_connection(user_id);
    connection.status = ConnectionStatus::Syncing;
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    );

    let result = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await;

    assert!(matches!(result, Err(SyncError::SyncInProgress(id)) if id == connection_id));
    // 거부는 실행 기록이나 상태를 건드리지 않습니다
    assert!(store.runs().is_empty());
    assert_eq!(
        store.connection(connection_id).status,
        ConnectionStatus::Syncing
    );
}

#[tokio::test]
async fn test_foreign_connection_is_not_found() {
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(owner);
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: vec![],
            error: None,
        },
    );

    let result = engine
        .sync_connection(stranger, connection_id, SyncTrigger::Manual)
        .await;
    assert!(matches!(result, Err(SyncError::ConnectionNotFound(_))));
}

#[tokio::test]
async fn test_broker_error_is_recorded_and_reraised() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let connection = legacy_connection(user_id);
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: vec![],
            error: Some(|| ProviderError::Api {
                status: 401,
                message: "invalid token".to_string(),
            }),
        },
    );

    let result = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await;

    match result {
        Err(SyncError::Broker(e)) => assert_eq!(e.client_status(), Some(401)),
        other => panic!("expected broker error, got {:?}", other.map(|r| r.message)),
    }

    let conn = store.connection(connection_id);
    assert_eq!(conn.status, ConnectionStatus::Error);
    assert!(conn.status_message.as_deref().unwrap().contains("401"));

    let runs = store.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, SyncRunStatus::Error);
}

#[tokio::test]
async fn test_encrypted_credentials_without_encryptor_fail() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let mut connection = legacy_connection(user_id);
    connection.credentials = StoredCredentials::Encrypted {
        ciphertext: vec![1, 2, 3],
        nonce: vec![0; 12],
    };
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: vec![],
            error: None,
        },
    );

    let result = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await;
    assert!(matches!(result, Err(SyncError::Credential(_))));
    // 자격증명 해석은 syncing 전이보다 앞서므로 상태는 그대로입니다
    assert_eq!(
        store.connection(connection_id).status,
        ConnectionStatus::Idle
    );
}

#[tokio::test]
async fn test_encrypted_credentials_round_trip_through_engine() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let encryptor = Arc::new(journal_core::CredentialEncryptor::new("master-key").unwrap());

    let creds = BrokerCredentials {
        api_key: "secret-token".to_string(),
        api_secret: String::new(),
        account_id: Some("ACC-9".to_string()),
        additional: None,
    };
    let (ciphertext, nonce) = encryptor.encrypt_json(&creds).unwrap();

    let mut connection = legacy_connection(user_id);
    connection.credentials = StoredCredentials::Encrypted { ciphertext, nonce };
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: round_trip_executions(),
            error: None,
        },
    )
    .with_encryptor(encryptor);

    let report = engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();
    assert_eq!(report.trades_imported, 1);
}

#[tokio::test]
async fn test_cursor_only_moves_forward() {
    let user_id = Uuid::new_v4();
    let store = Arc::new(MemoryTradeStore::new());
    let future = Utc::now() + Duration::hours(6);
    let mut connection = legacy_connection(user_id);
    connection.last_sync_at = Some(future);
    let connection_id = connection.id;
    store.add_connection(connection);

    let engine = engine_with(
        store.clone(),
        ScriptedProvider {
            executions: vec![],
            error: None,
        },
    );

    engine
        .sync_connection(user_id, connection_id, SyncTrigger::Manual)
        .await
        .unwrap();

    // 성공 마감의 now()가 기존 커서보다 과거이면 커서는 유지됩니다
    assert_eq!(store.connection(connection_id).last_sync_at, Some(future));
}
