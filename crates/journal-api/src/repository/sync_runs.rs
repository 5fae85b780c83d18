//! 동기화 실행 기록 Repository.
//!
//! append-only 테이블이며 `running → success|error` 종결만 허용됩니다.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use journal_core::{SyncRun, SyncRunStatus};

#[derive(FromRow)]
struct SyncRunRow {
    id: Uuid,
    connection_id: Uuid,
    trigger_type: String,
    status: String,
    trades_synced: i32,
    trades_skipped: i32,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SyncRunRow> for SyncRun {
    type Error = String;

    fn try_from(row: SyncRunRow) -> Result<Self, Self::Error> {
        Ok(SyncRun {
            id: row.id,
            connection_id: row.connection_id,
            trigger: row.trigger_type.parse()?,
            status: row.status.parse()?,
            trades_synced: row.trades_synced,
            trades_skipped: row.trades_skipped,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// 동기화 실행 기록 Repository.
pub struct SyncRunRepository;

impl SyncRunRepository {
    /// `running` 상태의 실행 기록 삽입.
    pub async fn insert(pool: &PgPool, run: &SyncRun) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, connection_id, trigger_type, status,
                trades_synced, trades_skipped, error_message, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(run.id)
        .bind(run.connection_id)
        .bind(run.trigger.to_string())
        .bind(run.status.to_string())
        .bind(run.trades_synced)
        .bind(run.trades_skipped)
        .bind(&run.error_message)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 실행 기록 종결.
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        status: SyncRunStatus,
        trades_synced: i32,
        trades_skipped: i32,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = $2, trades_synced = $3, trades_skipped = $4,
                error_message = $5, completed_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(trades_synced)
        .bind(trades_skipped)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 커넥션의 실행 이력 조회 (최신순).
    pub async fn list_for_connection(
        pool: &PgPool,
        connection_id: Uuid,
        limit: i64,
    ) -> Result<Vec<SyncRun>, String> {
        let rows: Vec<SyncRunRow> = sqlx::query_as(
            r#"
            SELECT id, connection_id, trigger_type, status,
                   trades_synced, trades_skipped, error_message, started_at, completed_at
            FROM sync_runs
            WHERE connection_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(connection_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| e.to_string())?;

        rows.into_iter().map(SyncRun::try_from).collect()
    }
}
