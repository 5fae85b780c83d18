//! Mock 브로커 [`BrokerProvider`] 구현.
//!
//! 실제 브로커 계정 없이 동기화 파이프라인 전체를 검증하는 가상
//! 브로커입니다. 고정된 체결 이력을 반환하며, 커서 필터를 실제
//! 브로커와 동일하게 적용합니다.
//!
//! [`BrokerProvider`]: journal_core::BrokerProvider

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

use journal_core::{BrokerProvider, ProviderError, RawExecution, Side};

/// Mock 브로커 제공자.
pub struct MockBrokerProvider {
    executions: Vec<RawExecution>,
}

impl MockBrokerProvider {
    /// 지정한 체결 이력으로 생성.
    pub fn new(executions: Vec<RawExecution>) -> Self {
        Self { executions }
    }

    /// 데모용 고정 이력: ES 라운드트립 2건 + NQ 라운드트립 1건.
    pub fn with_sample_history() -> Self {
        let base = Utc
            .with_ymd_and_hms(2026, 1, 5, 14, 30, 0)
            .single()
            .unwrap_or_default();
        let at = |minutes: i64| base + Duration::minutes(minutes);

        Self::new(vec![
            RawExecution::new("mock-1", "mo-1", "ES", Side::Buy, dec!(1), dec!(4980.25), at(0)),
            RawExecution::new("mock-2", "mo-2", "ES", Side::Sell, dec!(1), dec!(4986.50), at(12)),
            RawExecution::new("mock-3", "mo-3", "NQ", Side::Sell, dec!(2), dec!(17850.00), at(30)),
            RawExecution::new("mock-4", "mo-4", "NQ", Side::Buy, dec!(2), dec!(17838.75), at(55)),
            RawExecution::new("mock-5", "mo-5", "ES", Side::Buy, dec!(3), dec!(4990.00), at(90)),
            RawExecution::new("mock-6", "mo-6", "ES", Side::Sell, dec!(3), dec!(4985.25), at(110)),
        ])
    }
}

#[async_trait]
impl BrokerProvider for MockBrokerProvider {
    async fn fetch_executions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawExecution>, ProviderError> {
        let executions = self
            .executions
            .iter()
            .filter(|e| since.map_or(true, |cursor| e.executed_at >= cursor))
            .cloned()
            .collect();
        Ok(executions)
    }

    fn broker_name(&self) -> &str {
        "mock"
    }
}
