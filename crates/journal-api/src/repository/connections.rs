//! 브로커 커넥션 Repository.
//!
//! 자격증명은 암호화 컬럼 쌍(`encrypted_credentials` + `encryption_nonce`)
//! 또는 레거시 평문 JSONB(`legacy_credentials`) 중 정확히 한쪽에
//! 저장됩니다.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use journal_core::{BrokerConnection, ConnectionStatus, StoredCredentials};

/// DB에서 조회한 커넥션 row.
#[derive(FromRow)]
struct ConnectionRow {
    id: Uuid,
    user_id: Uuid,
    broker_id: String,
    is_paper: bool,
    encrypted_credentials: Option<Vec<u8>>,
    encryption_nonce: Option<Vec<u8>>,
    legacy_credentials: Option<JsonValue>,
    status: String,
    status_message: Option<String>,
    last_sync_at: Option<DateTime<Utc>>,
    total_trades_synced: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRow> for BrokerConnection {
    type Error = String;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        let credentials = match (
            row.encrypted_credentials,
            row.encryption_nonce,
            row.legacy_credentials,
        ) {
            (Some(ciphertext), Some(nonce), _) => {
                StoredCredentials::Encrypted { ciphertext, nonce }
            }
            (_, _, Some(value)) => StoredCredentials::Legacy(value),
            _ => return Err(format!("connection {} has no stored credentials", row.id)),
        };

        Ok(BrokerConnection {
            id: row.id,
            user_id: row.user_id,
            broker_id: row.broker_id,
            is_paper: row.is_paper,
            credentials,
            status: row.status.parse()?,
            status_message: row.status_message,
            last_sync_at: row.last_sync_at,
            total_trades_synced: row.total_trades_synced,
            created_at: row.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, broker_id, is_paper, encrypted_credentials, \
     encryption_nonce, legacy_credentials, status, status_message, last_sync_at, \
     total_trades_synced, created_at";

/// 브로커 커넥션 Repository.
pub struct ConnectionRepository;

impl ConnectionRepository {
    /// 커넥션 등록.
    pub async fn insert(pool: &PgPool, connection: &BrokerConnection) -> Result<(), sqlx::Error> {
        let (ciphertext, nonce, legacy): (Option<&[u8]>, Option<&[u8]>, Option<&JsonValue>) =
            match &connection.credentials {
                StoredCredentials::Encrypted { ciphertext, nonce } => {
                    (Some(ciphertext), Some(nonce), None)
                }
                StoredCredentials::Legacy(value) => (None, None, Some(value)),
            };

        sqlx::query(
            r#"
            INSERT INTO broker_connections (
                id, user_id, broker_id, is_paper,
                encrypted_credentials, encryption_nonce, legacy_credentials,
                status, status_message, last_sync_at, total_trades_synced, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(connection.id)
        .bind(connection.user_id)
        .bind(&connection.broker_id)
        .bind(connection.is_paper)
        .bind(ciphertext)
        .bind(nonce)
        .bind(legacy)
        .bind(connection.status.to_string())
        .bind(&connection.status_message)
        .bind(connection.last_sync_at)
        .bind(connection.total_trades_synced)
        .bind(connection.created_at)
        .execute(pool)
        .await?;

        debug!(connection_id = %connection.id, broker = %connection.broker_id, "Connection registered");
        Ok(())
    }

    /// 커넥션 단건 조회.
    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<BrokerConnection>, String> {
        let query = format!("SELECT {} FROM broker_connections WHERE id = $1", SELECT_COLUMNS);
        let row: Option<ConnectionRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| e.to_string())?;

        row.map(BrokerConnection::try_from).transpose()
    }

    /// 사용자 커넥션 목록 (최신 등록 순).
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<BrokerConnection>, String> {
        let query = format!(
            "SELECT {} FROM broker_connections WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows: Vec<ConnectionRow> = sqlx::query_as(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(|e| e.to_string())?;

        rows.into_iter().map(BrokerConnection::try_from).collect()
    }

    /// 상태 전이.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: ConnectionStatus,
        message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE broker_connections
            SET status = $2, status_message = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// 성공 동기화 마감: `connected` 전이, 커서 전진, 누적 카운터 증가.
    ///
    /// 커서는 `GREATEST`로 앞으로만 움직입니다.
    pub async fn complete_sync(
        pool: &PgPool,
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        new_trades: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE broker_connections
            SET status = 'connected',
                status_message = NULL,
                last_sync_at = GREATEST(COALESCE(last_sync_at, 'epoch'::timestamptz), $2),
                total_trades_synced = total_trades_synced + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_sync_at)
        .bind(new_trades)
        .execute(pool)
        .await?;
        Ok(())
    }
}
