//! 체결-트레이드 링크 Repository.
//!
//! `unique(connection_id, execution_id)` 제약이 커넥션 단위 dedup
//! 불변식을 DB 수준에서도 보장합니다.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use journal_core::ExecutionLink;

/// 체결-트레이드 링크 Repository.
pub struct ExecutionLinkRepository;

impl ExecutionLinkRepository {
    /// 주어진 체결 ID 중 이미 링크된 것 조회.
    pub async fn find_linked(
        pool: &PgPool,
        connection_id: Uuid,
        execution_ids: &[String],
    ) -> Result<HashSet<String>, sqlx::Error> {
        if execution_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT execution_id
            FROM trade_execution_links
            WHERE connection_id = $1 AND execution_id = ANY($2)
            "#,
        )
        .bind(connection_id)
        .bind(execution_ids)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// 링크 일괄 삽입.
    ///
    /// 유니크 제약 충돌은 무시합니다 (동시 실행 레이스의 마지막 방어선).
    pub async fn insert_many(pool: &PgPool, links: &[ExecutionLink]) -> Result<(), sqlx::Error> {
        if links.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for link in links {
            sqlx::query(
                r#"
                INSERT INTO trade_execution_links (connection_id, trade_id, execution_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (connection_id, execution_id) DO NOTHING
                "#,
            )
            .bind(link.connection_id)
            .bind(link.trade_id)
            .bind(&link.execution_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
