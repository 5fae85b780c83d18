//! 브로커 커넥션 및 동기화 실행 기록 타입.
//!
//! 커넥션은 한 사용자와 한 브로커 사이의 링크이며, 동기화 컨트롤러만
//! 상태를 변경합니다. 동기화 실행 기록(SyncRun)은 호출당 한 건씩
//! append-only로 쌓이며 `running → success|error` 전이만 허용됩니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 커넥션 상태.
///
/// `Syncing`은 정확히 하나의 진행 중 SyncRun 동안만 유지됩니다.
/// 한 번이라도 성공한 커넥션의 안정 상태는 `Connected`입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// 최초 등록 후 아직 동기화 전
    Idle,
    /// 동기화 진행 중
    Syncing,
    /// 마지막 동기화 성공
    Connected,
    /// 마지막 동기화 실패
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Syncing => write!(f, "syncing"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(ConnectionStatus::Idle),
            "syncing" => Ok(ConnectionStatus::Syncing),
            "connected" => Ok(ConnectionStatus::Connected),
            "error" => Ok(ConnectionStatus::Error),
            _ => Err(format!("Invalid connection status: {}", s)),
        }
    }
}

/// 저장된 자격증명.
///
/// 암호화 형식과 레거시 평문 객체 형식을 모두 지원합니다.
/// 형식 마이그레이션 여부와 무관하게 동기화는 차단되지 않으며,
/// 실행 시작 시점에 한 번만 해석됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum StoredCredentials {
    /// AES-256-GCM 암호문 + nonce
    Encrypted {
        ciphertext: Vec<u8>,
        nonce: Vec<u8>,
    },
    /// 레거시 평문 JSON 객체 (하위 호환)
    Legacy(JsonValue),
}

/// 복호화된 자격증명.
///
/// 브로커 커넥터 생성에만 사용되며 저장되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerCredentials {
    /// API 접근 토큰 또는 키
    pub api_key: String,
    /// API 시크릿 (토큰 기반 브로커는 빈 값)
    #[serde(default)]
    pub api_secret: String,
    /// 계좌 번호 (최상위 필드, 없으면 additional에서 폴백)
    #[serde(default)]
    pub account_id: Option<String>,
    /// 브로커별 추가 필드
    #[serde(default)]
    pub additional: Option<HashMap<String, String>>,
}

impl BrokerCredentials {
    /// 계좌 번호 추출 (최상위 필드 우선, 없으면 additional에서).
    pub fn account_id(&self) -> Option<&str> {
        if let Some(acc) = self.account_id.as_deref() {
            if !acc.is_empty() {
                return Some(acc);
            }
        }
        self.additional
            .as_ref()
            .and_then(|m| m.get("account_id"))
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// 사용자-브로커 커넥션.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConnection {
    /// 커넥션 ID
    pub id: Uuid,
    /// 소유 사용자 ID
    pub user_id: Uuid,
    /// 브로커 식별자 (예: "tradier", "mock")
    pub broker_id: String,
    /// 모의투자 계좌 여부
    pub is_paper: bool,
    /// 저장된 자격증명 (직렬화 시 외부 노출 금지)
    #[serde(skip_serializing)]
    pub credentials: StoredCredentials,
    /// 현재 상태
    pub status: ConnectionStatus,
    /// 마지막 에러 메시지
    pub status_message: Option<String>,
    /// 마지막 성공 동기화 커서 (타임스탬프). 앞으로만 전진합니다.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// 누적 동기화 트레이드 수
    pub total_trades_synced: i64,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

/// 동기화 트리거 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    /// 사용자 수동 요청
    Manual,
    /// 스케줄러 (외부)
    Scheduled,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Manual => write!(f, "manual"),
            SyncTrigger::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl std::str::FromStr for SyncTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(SyncTrigger::Manual),
            "scheduled" => Ok(SyncTrigger::Scheduled),
            _ => Err(format!("Invalid sync trigger: {}", s)),
        }
    }
}

/// 동기화 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Success,
    Error,
}

impl std::fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRunStatus::Running => write!(f, "running"),
            SyncRunStatus::Success => write!(f, "success"),
            SyncRunStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SyncRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(SyncRunStatus::Running),
            "success" => Ok(SyncRunStatus::Success),
            "error" => Ok(SyncRunStatus::Error),
            _ => Err(format!("Invalid sync run status: {}", s)),
        }
    }
}

/// 동기화 실행 기록 (호출당 1건, append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    /// 실행 ID
    pub id: Uuid,
    /// 대상 커넥션
    pub connection_id: Uuid,
    /// 트리거 종류
    pub trigger: SyncTrigger,
    /// 실행 상태
    pub status: SyncRunStatus,
    /// 가져온 트레이드 수
    pub trades_synced: i32,
    /// 건너뛴 체결 수 (dedup/미매칭)
    pub trades_skipped: i32,
    /// 실패 시 에러 메시지
    pub error_message: Option<String>,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각 (running 동안은 None)
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    /// `running` 상태의 새 실행 기록 생성.
    pub fn started(connection_id: Uuid, trigger: SyncTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id,
            trigger,
            status: SyncRunStatus::Running,
            trades_synced: 0,
            trades_skipped: 0,
            error_message: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}
