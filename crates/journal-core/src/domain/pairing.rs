//! 체결 페어링 엔진.
//!
//! 한 계정의 매수/매도 체결 스트림을 방향성 FIFO 매칭으로
//! 라운드트립 트레이드로 재구성합니다. 심볼별로 그룹화하여 매칭하며,
//! 수량이 정확히 일치하는 2-leg 매칭만 수행합니다.
//!
//! 순수 함수이며 I/O와 에러가 없습니다. 매칭되지 않은 체결
//! (수량 불일치, 짝 없는 leg, 미청산 포지션)은 이번 실행의 결과에서
//! 제외되며 에러로 취급하지 않습니다.

use std::collections::BTreeMap;

use rust_decimal_macros::dec;
use tracing::debug;
use uuid::Uuid;

use super::execution::{RawExecution, Side};
use super::instrument::InstrumentRegistry;
use super::pnl::compute_pnl;
use super::trade::{CanonicalTrade, TradeDirection, TradeOutcome};

/// 체결 목록을 라운드트립 트레이드로 페어링.
///
/// 알고리즘 (심볼별로 수행):
/// 1. 매수/매도로 분할하고 각각 체결 시각 오름차순 정렬.
/// 2. 롱 패스: 각 미소비 매수에 대해, 수량이 정확히 같고 시각이
///    엄격히 늦은 첫 번째 미소비 매도를 찾아 롱 트레이드 생성.
/// 3. 숏 패스: 남은 미소비 매도에 대해 대칭으로 숏 트레이드 생성.
/// 4. 동일 수량 후보가 여럿이면 항상 가장 이른 체결을 선택 (순수 FIFO).
///
/// 빈 입력은 빈 목록을 반환합니다.
pub fn pair_executions(
    user_id: Uuid,
    executions: &[RawExecution],
    registry: &InstrumentRegistry,
) -> Vec<CanonicalTrade> {
    if executions.is_empty() {
        return Vec::new();
    }

    // 심볼별 그룹화 (BTreeMap: 출력 순서 결정적)
    let mut by_symbol: BTreeMap<String, Vec<&RawExecution>> = BTreeMap::new();
    for exec in executions {
        by_symbol
            .entry(exec.symbol.to_uppercase())
            .or_default()
            .push(exec);
    }

    let mut trades = Vec::new();
    for (symbol, group) in by_symbol {
        let before = trades.len();
        pair_symbol(user_id, &symbol, &group, registry, &mut trades);
        let paired = (trades.len() - before) * 2;
        if paired < group.len() {
            debug!(
                symbol = %symbol,
                unmatched = group.len() - paired,
                "Dropping unmatched executions from this run"
            );
        }
    }
    trades
}

/// 단일 심볼에 대한 방향성 FIFO 매칭.
fn pair_symbol(
    user_id: Uuid,
    symbol: &str,
    executions: &[&RawExecution],
    registry: &InstrumentRegistry,
    out: &mut Vec<CanonicalTrade>,
) {
    let mut buys: Vec<&RawExecution> = executions
        .iter()
        .copied()
        .filter(|e| e.side == Side::Buy)
        .collect();
    let mut sells: Vec<&RawExecution> = executions
        .iter()
        .copied()
        .filter(|e| e.side == Side::Sell)
        .collect();

    buys.sort_by_key(|e| e.executed_at);
    sells.sort_by_key(|e| e.executed_at);

    let mut buy_used = vec![false; buys.len()];
    let mut sell_used = vec![false; sells.len()];

    // 롱 패스: 매수 → 이후의 동일 수량 매도
    for (bi, buy) in buys.iter().enumerate() {
        if buy_used[bi] {
            continue;
        }
        let candidate = sells.iter().enumerate().find(|(si, sell)| {
            !sell_used[*si]
                && sell.filled_qty == buy.filled_qty
                && sell.executed_at > buy.executed_at
        });
        if let Some((si, sell)) = candidate {
            buy_used[bi] = true;
            sell_used[si] = true;
            out.push(build_trade(
                user_id,
                symbol,
                TradeDirection::Long,
                buy,
                sell,
                registry,
            ));
        }
    }

    // 숏 패스: 매도 → 이후의 동일 수량 매수
    for (si, sell) in sells.iter().enumerate() {
        if sell_used[si] {
            continue;
        }
        let candidate = buys.iter().enumerate().find(|(bi, buy)| {
            !buy_used[*bi]
                && buy.filled_qty == sell.filled_qty
                && buy.executed_at > sell.executed_at
        });
        if let Some((bi, buy)) = candidate {
            sell_used[si] = true;
            buy_used[bi] = true;
            out.push(build_trade(
                user_id,
                symbol,
                TradeDirection::Short,
                sell,
                buy,
                registry,
            ));
        }
    }
}

/// 진입/청산 체결 쌍으로 트레이드 생성.
fn build_trade(
    user_id: Uuid,
    symbol: &str,
    direction: TradeDirection,
    entry: &RawExecution,
    exit: &RawExecution,
    registry: &InstrumentRegistry,
) -> CanonicalTrade {
    let pnl = compute_pnl(
        registry,
        symbol,
        direction,
        entry.avg_price,
        exit.avg_price,
        entry.filled_qty,
    );

    // 손절 기본값: 롱은 진입가의 98%, 숏은 102%
    let stop_loss = match direction {
        TradeDirection::Long => entry.avg_price * dec!(0.98),
        TradeDirection::Short => entry.avg_price * dec!(1.02),
    };

    CanonicalTrade {
        id: Uuid::new_v4(),
        user_id,
        symbol: symbol.to_string(),
        direction,
        entry_price: entry.avg_price,
        exit_price: exit.avg_price,
        size: entry.filled_qty,
        stop_loss,
        pnl: pnl.adjusted_pnl,
        outcome: TradeOutcome::from_pnl(pnl.adjusted_pnl),
        note: String::new(),
        entry_execution_id: entry.execution_id.clone(),
        exit_execution_id: Some(exit.execution_id.clone()),
        entered_at: entry.executed_at,
        exited_at: exit.executed_at,
    }
}
