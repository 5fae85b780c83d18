//! 손익 정규화 모듈.
//!
//! 방향성 가격 변동과 수량을 상품 프로파일 기준의 정규화 손익으로
//! 변환하는 순수 함수 계층입니다. 이 모듈 내부에서는 반올림하지 않으며,
//! 표시 반올림은 `InstrumentProfile::display_decimals`를 사용하는
//! 프레젠테이션 계층의 책임입니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::instrument::{InstrumentCategory, InstrumentRegistry};
use super::trade::TradeDirection;

/// 정규화 손익 분해 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlBreakdown {
    /// 원시 손익: 가격 변동 × 수량 (상품 보정 없음, 비교/디버깅용)
    pub raw_pnl: Decimal,
    /// 정규화 손익: 가격 변동 × 수량 × 계약 승수. 제품 전역에서
    /// 사용하는 공식 손익 수치입니다.
    pub adjusted_pnl: Decimal,
    /// 포인트: |가격 변동|
    pub points: Decimal,
    /// 핍: 외환은 핍 단위 환산, 그 외 분류는 포인트와 동일
    pub pips: Decimal,
    /// 수익률 (%): 진입가 기준. 진입가 0이면 0.
    pub percentage: Decimal,
}

/// 외환 페어의 핍 크기.
///
/// JPY로 호가되는 페어(끝 3글자 토큰에 JPY 포함)는 0.01,
/// 그 외는 0.0001입니다.
fn pip_size(symbol: &str) -> Decimal {
    let upper = symbol.to_uppercase();
    let quote: String = upper
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<Vec<_>>()
        .iter()
        .rev()
        .take(3)
        .rev()
        .collect();

    if quote.contains("JPY") {
        dec!(0.01)
    } else {
        dec!(0.0001)
    }
}

/// 심볼/방향/가격/수량으로 정규화 손익 계산.
///
/// 1. `price_delta = 롱 ? 청산가 - 진입가 : 진입가 - 청산가`
/// 2. `raw_pnl = price_delta × size`
/// 3. `adjusted_pnl = raw_pnl × 계약 승수`
/// 4. `points = |price_delta|`
/// 5. `pips`: 외환만 핍 환산, 나머지는 포인트 그대로
/// 6. `percentage = 진입가 > 0 ? (price_delta / 진입가) × 100 : 0`
///
/// 진입가 0은 에러가 아니라 수익률 0으로 처리됩니다.
pub fn compute_pnl(
    registry: &InstrumentRegistry,
    symbol: &str,
    direction: TradeDirection,
    entry_price: Decimal,
    exit_price: Decimal,
    size: Decimal,
) -> PnlBreakdown {
    let profile = registry.lookup(symbol);

    let price_delta = match direction {
        TradeDirection::Long => exit_price - entry_price,
        TradeDirection::Short => entry_price - exit_price,
    };

    let raw_pnl = price_delta * size;
    let adjusted_pnl = raw_pnl * profile.multiplier;
    let points = price_delta.abs();

    let pips = if profile.category == InstrumentCategory::Forex {
        points / pip_size(symbol)
    } else {
        points
    };

    let percentage = if entry_price > Decimal::ZERO {
        (price_delta / entry_price) * dec!(100)
    } else {
        Decimal::ZERO
    };

    PnlBreakdown {
        raw_pnl,
        adjusted_pnl,
        points,
        pips,
        percentage,
    }
}
