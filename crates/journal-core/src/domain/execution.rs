//! 브로커 체결(Raw Execution) 타입.
//!
//! 브로커가 보고한 체결 한 건을 중립 형식으로 표현합니다.
//! 커넥터별 serde 타입은 커넥터 크레이트 내부에 유지되며
//! 이 타입으로 변환되어 코어에 전달됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 매수/매도 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "buy_to_open" | "buy_to_close" | "buy_to_cover" => Ok(Side::Buy),
            "sell" | "sell_to_open" | "sell_to_close" | "sell_short" => Ok(Side::Sell),
            _ => Err(format!("Invalid side: {}", s)),
        }
    }
}

/// 체결 상태.
///
/// 페어링 전에 `Filled`만 통과시키며 나머지는 제외합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// 전량 체결
    Filled,
    /// 미체결 (대기)
    Open,
    /// 부분 체결
    PartiallyFilled,
    /// 취소
    Canceled,
    /// 거부
    Rejected,
    /// 만료
    Expired,
}

impl ExecutionStatus {
    /// 페어링 대상 여부.
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionStatus::Filled)
    }
}

/// 브로커가 보고한 체결 한 건.
///
/// 동기화 호출 시마다 브로커에서 새로 조회되며, 이 체결이 만들어낸
/// 트레이드와 별개로 단독 저장되지 않습니다. `raw_data`는 감사 목적으로
/// 브로커 원본 페이로드를 보존합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExecution {
    /// 브로커 체결 ID
    pub execution_id: String,
    /// 브로커 주문 ID
    pub order_id: String,
    /// 상품 심볼
    pub symbol: String,
    /// 매수/매도
    pub side: Side,
    /// 체결 상태
    pub status: ExecutionStatus,
    /// 체결 수량
    pub filled_qty: Decimal,
    /// 평균 체결가
    pub avg_price: Decimal,
    /// 체결 시각
    pub executed_at: DateTime<Utc>,
    /// 브로커 원본 페이로드 (감사용)
    #[serde(default)]
    pub raw_data: Option<JsonValue>,
}

impl RawExecution {
    /// 새 체결 생성 (원본 페이로드 없이).
    pub fn new(
        execution_id: impl Into<String>,
        order_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        filled_qty: Decimal,
        avg_price: Decimal,
        executed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            order_id: order_id.into(),
            symbol: symbol.into(),
            side,
            status: ExecutionStatus::Filled,
            filled_qty,
            avg_price,
            executed_at,
            raw_data: None,
        }
    }

    /// 원본 페이로드 부착.
    pub fn with_raw_data(mut self, raw: JsonValue) -> Self {
        self.raw_data = Some(raw);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_side_from_str_accepts_broker_variants() {
        assert_eq!(Side::from_str("buy").unwrap(), Side::Buy);
        assert_eq!(Side::from_str("BUY_TO_COVER").unwrap(), Side::Buy);
        assert_eq!(Side::from_str("sell_short").unwrap(), Side::Sell);
        assert!(Side::from_str("hold").is_err());
    }

    #[test]
    fn test_only_filled_status_is_pairable() {
        assert!(ExecutionStatus::Filled.is_filled());
        assert!(!ExecutionStatus::PartiallyFilled.is_filled());
        assert!(!ExecutionStatus::Canceled.is_filled());
        assert!(!ExecutionStatus::Open.is_filled());
    }
}
