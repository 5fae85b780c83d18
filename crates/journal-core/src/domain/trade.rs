//! 라운드트립 트레이드(CanonicalTrade) 타입.
//!
//! 페어링 엔진이 생성하는 분석의 기본 단위입니다.
//! 진입/청산 체결 한 쌍(또는 사전 집계 보고서의 경우 한 건)으로 구성되며,
//! 저장 후에는 노트 등 보강 필드를 제외하고 불변입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDirection::Long => write!(f, "long"),
            TradeDirection::Short => write!(f, "short"),
        }
    }
}

impl std::str::FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" => Ok(TradeDirection::Long),
            "short" => Ok(TradeDirection::Short),
            _ => Err(format!("Invalid trade direction: {}", s)),
        }
    }
}

/// 트레이드 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
    Breakeven,
}

impl TradeOutcome {
    /// 손익 부호로 결과 도출 (양수=승, 음수=패, 0=본전).
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            TradeOutcome::Win
        } else if pnl < Decimal::ZERO {
            TradeOutcome::Loss
        } else {
            TradeOutcome::Breakeven
        }
    }
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Win => write!(f, "win"),
            TradeOutcome::Loss => write!(f, "loss"),
            TradeOutcome::Breakeven => write!(f, "breakeven"),
        }
    }
}

impl std::str::FromStr for TradeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(TradeOutcome::Win),
            "loss" => Ok(TradeOutcome::Loss),
            "breakeven" => Ok(TradeOutcome::Breakeven),
            _ => Err(format!("Invalid trade outcome: {}", s)),
        }
    }
}

/// 재구성된 라운드트립 트레이드.
///
/// 페어링 엔진에서만 생성됩니다. `entry_execution_id`/`exit_execution_id`는
/// 이 트레이드를 만든 원본 체결과의 링크이며, 브로커가 이미 라운드트립
/// 형식으로 보고하는 경우 청산 링크가 없을 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTrade {
    /// 트레이드 ID
    pub id: Uuid,
    /// 소유 사용자 ID
    pub user_id: Uuid,
    /// 상품 심볼
    pub symbol: String,
    /// 포지션 방향
    pub direction: TradeDirection,
    /// 진입가
    pub entry_price: Decimal,
    /// 청산가
    pub exit_price: Decimal,
    /// 수량
    pub size: Decimal,
    /// 손절가 (브로커 미제공 시 진입가 기반 기본값)
    pub stop_loss: Decimal,
    /// 정규화 손익 (계약 승수 반영)
    pub pnl: Decimal,
    /// 결과 (손익 부호에서 도출)
    pub outcome: TradeOutcome,
    /// 사용자 노트
    pub note: String,
    /// 진입 체결 ID
    pub entry_execution_id: String,
    /// 청산 체결 ID (사전 집계 형식은 None)
    pub exit_execution_id: Option<String>,
    /// 진입 시각
    pub entered_at: DateTime<Utc>,
    /// 청산 시각
    pub exited_at: DateTime<Utc>,
}

impl CanonicalTrade {
    /// 이 트레이드를 구성한 체결 ID 목록 (1~2건).
    pub fn execution_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.entry_execution_id.as_str()];
        if let Some(exit_id) = &self.exit_execution_id {
            ids.push(exit_id.as_str());
        }
        ids
    }
}
