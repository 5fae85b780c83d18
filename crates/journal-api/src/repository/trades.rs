//! 트레이드 Repository.

use sqlx::PgPool;
use tracing::debug;

use journal_core::CanonicalTrade;

/// 트레이드 Repository.
pub struct TradeRepository;

impl TradeRepository {
    /// 트레이드 일괄 삽입.
    ///
    /// 한 트랜잭션으로 묶어 전부 들어가거나 전부 실패합니다.
    pub async fn insert_many(
        pool: &PgPool,
        trades: &[CanonicalTrade],
    ) -> Result<(), sqlx::Error> {
        if trades.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO trades (
                    id, user_id, symbol, direction, entry_price, exit_price,
                    size, stop_loss, pnl, outcome, note, entered_at, exited_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(trade.id)
            .bind(trade.user_id)
            .bind(&trade.symbol)
            .bind(trade.direction.to_string())
            .bind(trade.entry_price)
            .bind(trade.exit_price)
            .bind(trade.size)
            .bind(trade.stop_loss)
            .bind(trade.pnl)
            .bind(trade.outcome.to_string())
            .bind(&trade.note)
            .bind(trade.entered_at)
            .bind(trade.exited_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = trades.len(), "Trades inserted");
        Ok(())
    }
}
