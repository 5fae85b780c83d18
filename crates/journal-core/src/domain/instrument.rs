//! 상품 프로파일 레지스트리.
//!
//! 심볼별 계약 경제성(승수, 틱 크기, 틱 가치, 표시 소수점)을 제공하는
//! 정적 조회 테이블입니다. 프로세스 시작 시 한 번 생성하여 참조로 전달합니다.
//!
//! 미등록 심볼은 에러가 아니라 승수 1의 기본 프로파일로 폴백합니다.
//! 호출자는 조회 실패를 에러로 취급해서는 안 됩니다.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 상품 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentCategory {
    /// 지수/에너지/금속 선물
    Futures,
    /// 외환 (메이저/크로스 페어)
    Forex,
    /// 주식/ETF
    Stocks,
    /// 암호화폐
    Crypto,
    /// 현물 원자재
    Commodities,
    /// 지수 옵션 래퍼
    Options,
    /// 미등록 심볼 폴백
    Unknown,
}

impl std::fmt::Display for InstrumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentCategory::Futures => write!(f, "futures"),
            InstrumentCategory::Forex => write!(f, "forex"),
            InstrumentCategory::Stocks => write!(f, "stocks"),
            InstrumentCategory::Crypto => write!(f, "crypto"),
            InstrumentCategory::Commodities => write!(f, "commodities"),
            InstrumentCategory::Options => write!(f, "options"),
            InstrumentCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// 상품별 계약 경제성 프로파일.
///
/// 불변 데이터이며 레지스트리 생성 시점에 고정됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    /// 심볼 (대문자)
    pub symbol: String,
    /// 표시 이름
    pub display_name: String,
    /// 상품 분류
    pub category: InstrumentCategory,
    /// 계약 승수 (1포인트 가격 변동의 달러 가치)
    pub multiplier: Decimal,
    /// 최소 호가 단위
    pub tick_size: Decimal,
    /// 1틱의 달러 가치
    pub tick_value: Decimal,
    /// 표시 통화
    pub currency: String,
    /// 표시 소수점 자릿수 (프레젠테이션 전용, 계산에는 사용하지 않음)
    pub display_decimals: u32,
}

impl InstrumentProfile {
    /// 미등록 심볼용 기본 프로파일.
    ///
    /// 승수 1이므로 손익은 가격 변동 × 수량 그대로입니다.
    pub fn fallback(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            display_name: symbol.to_uppercase(),
            category: InstrumentCategory::Unknown,
            multiplier: Decimal::ONE,
            tick_size: dec!(0.01),
            tick_value: dec!(0.01),
            currency: "USD".to_string(),
            display_decimals: 2,
        }
    }
}

/// 상품 프로파일 레지스트리.
///
/// 내장 테이블로 한 번 생성되며 이후 읽기 전용입니다.
/// 전역 상태 대신 명시적인 값으로 만들어 참조로 전달합니다.
#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    profiles: HashMap<String, InstrumentProfile>,
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl InstrumentRegistry {
    /// 내장 상품 테이블로 레지스트리 생성.
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        for profile in builtin_profiles() {
            profiles.insert(profile.symbol.clone(), profile);
        }
        Self { profiles }
    }

    /// 심볼로 프로파일 조회 (대소문자 무시).
    ///
    /// 미등록 심볼은 [`InstrumentProfile::fallback`]을 반환하며
    /// 절대 실패하지 않습니다.
    pub fn lookup(&self, symbol: &str) -> InstrumentProfile {
        let key = symbol.trim().to_uppercase();
        self.profiles
            .get(&key)
            .cloned()
            .unwrap_or_else(|| InstrumentProfile::fallback(&key))
    }

    /// 등록된 프로파일 수.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// 레지스트리가 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// 프로파일 한 건 생성 헬퍼.
#[allow(clippy::too_many_arguments)]
fn profile(
    symbol: &str,
    display_name: &str,
    category: InstrumentCategory,
    multiplier: Decimal,
    tick_size: Decimal,
    tick_value: Decimal,
    display_decimals: u32,
) -> InstrumentProfile {
    InstrumentProfile {
        symbol: symbol.to_string(),
        display_name: display_name.to_string(),
        category,
        multiplier,
        tick_size,
        tick_value,
        currency: "USD".to_string(),
        display_decimals,
    }
}

/// 내장 상품 테이블.
///
/// 지수/에너지/금속 선물(마이크로 포함), 메이저·크로스 외환 페어,
/// 대표 주식/ETF, 암호화폐, 현물 금속, 지수 옵션 래퍼를 포함합니다.
fn builtin_profiles() -> Vec<InstrumentProfile> {
    use InstrumentCategory::*;

    vec![
        // 지수 선물
        profile("ES", "E-mini S&P 500", Futures, dec!(50), dec!(0.25), dec!(12.50), 2),
        profile("MES", "Micro E-mini S&P 500", Futures, dec!(5), dec!(0.25), dec!(1.25), 2),
        profile("NQ", "E-mini Nasdaq-100", Futures, dec!(20), dec!(0.25), dec!(5.00), 2),
        profile("MNQ", "Micro E-mini Nasdaq-100", Futures, dec!(2), dec!(0.25), dec!(0.50), 2),
        profile("YM", "E-mini Dow", Futures, dec!(5), dec!(1), dec!(5.00), 0),
        profile("MYM", "Micro E-mini Dow", Futures, dec!(0.5), dec!(1), dec!(0.50), 0),
        profile("RTY", "E-mini Russell 2000", Futures, dec!(50), dec!(0.1), dec!(5.00), 1),
        profile("M2K", "Micro E-mini Russell 2000", Futures, dec!(5), dec!(0.1), dec!(0.50), 1),
        // 에너지 선물
        profile("CL", "Crude Oil", Futures, dec!(1000), dec!(0.01), dec!(10.00), 2),
        profile("MCL", "Micro Crude Oil", Futures, dec!(100), dec!(0.01), dec!(1.00), 2),
        profile("NG", "Natural Gas", Futures, dec!(10000), dec!(0.001), dec!(10.00), 3),
        // 금속 선물
        profile("GC", "Gold", Futures, dec!(100), dec!(0.1), dec!(10.00), 1),
        profile("MGC", "Micro Gold", Futures, dec!(10), dec!(0.1), dec!(1.00), 1),
        profile("SI", "Silver", Futures, dec!(5000), dec!(0.005), dec!(25.00), 3),
        profile("SIL", "Micro Silver", Futures, dec!(1000), dec!(0.005), dec!(5.00), 3),
        // 외환 메이저
        profile("EURUSD", "Euro / US Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("GBPUSD", "British Pound / US Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("AUDUSD", "Australian Dollar / US Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("NZDUSD", "New Zealand Dollar / US Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("USDCAD", "US Dollar / Canadian Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("USDCHF", "US Dollar / Swiss Franc", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("USDJPY", "US Dollar / Japanese Yen", Forex, dec!(1), dec!(0.01), dec!(0.01), 3),
        // 외환 크로스
        profile("EURJPY", "Euro / Japanese Yen", Forex, dec!(1), dec!(0.01), dec!(0.01), 3),
        profile("GBPJPY", "British Pound / Japanese Yen", Forex, dec!(1), dec!(0.01), dec!(0.01), 3),
        profile("AUDJPY", "Australian Dollar / Japanese Yen", Forex, dec!(1), dec!(0.01), dec!(0.01), 3),
        profile("EURGBP", "Euro / British Pound", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        profile("EURAUD", "Euro / Australian Dollar", Forex, dec!(1), dec!(0.0001), dec!(0.0001), 5),
        // 주식/ETF
        profile("AAPL", "Apple Inc.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("MSFT", "Microsoft Corp.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("NVDA", "NVIDIA Corp.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("TSLA", "Tesla Inc.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("AMZN", "Amazon.com Inc.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("META", "Meta Platforms Inc.", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("SPY", "SPDR S&P 500 ETF", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("QQQ", "Invesco QQQ Trust", Stocks, dec!(1), dec!(0.01), dec!(0.01), 2),
        // 암호화폐
        profile("BTCUSD", "Bitcoin / US Dollar", Crypto, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("ETHUSD", "Ethereum / US Dollar", Crypto, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("SOLUSD", "Solana / US Dollar", Crypto, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("BTCUSDT", "Bitcoin / Tether", Crypto, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("ETHUSDT", "Ethereum / Tether", Crypto, dec!(1), dec!(0.01), dec!(0.01), 2),
        // 현물 원자재
        profile("XAUUSD", "Gold Spot", Commodities, dec!(1), dec!(0.01), dec!(0.01), 2),
        profile("XAGUSD", "Silver Spot", Commodities, dec!(1), dec!(0.001), dec!(0.001), 3),
        // 지수 옵션 래퍼
        profile("SPX", "S&P 500 Index Options", Options, dec!(100), dec!(0.05), dec!(5.00), 2),
        profile("SPXW", "S&P 500 Weekly Options", Options, dec!(100), dec!(0.05), dec!(5.00), 2),
        profile("NDX", "Nasdaq-100 Index Options", Options, dec!(100), dec!(0.05), dec!(5.00), 2),
        profile("XSP", "Mini-SPX Options", Options, dec!(100), dec!(0.05), dec!(5.00), 2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = InstrumentRegistry::builtin();

        let upper = registry.lookup("NQ");
        let lower = registry.lookup("nq");
        let padded = registry.lookup(" nq ");

        assert_eq!(upper, lower);
        assert_eq!(upper, padded);
        assert_eq!(upper.multiplier, dec!(20));
        assert_eq!(upper.category, InstrumentCategory::Futures);
    }

    #[test]
    fn test_unknown_symbol_falls_back_to_multiplier_one() {
        let registry = InstrumentRegistry::builtin();

        let profile = registry.lookup("ZZZT");
        assert_eq!(profile.multiplier, Decimal::ONE);
        assert_eq!(profile.category, InstrumentCategory::Unknown);
        assert_eq!(profile.symbol, "ZZZT");
        assert_eq!(profile.display_decimals, 2);
    }

    #[test]
    fn test_jpy_pairs_quote_in_hundredths() {
        let registry = InstrumentRegistry::builtin();

        assert_eq!(registry.lookup("USDJPY").tick_size, dec!(0.01));
        assert_eq!(registry.lookup("EURJPY").tick_size, dec!(0.01));
        assert_eq!(registry.lookup("EURUSD").tick_size, dec!(0.0001));
    }

    #[test]
    fn test_builtin_table_is_populated() {
        let registry = InstrumentRegistry::builtin();
        assert!(registry.len() >= 40);
        assert!(!registry.is_empty());
    }
}
