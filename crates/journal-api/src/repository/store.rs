//! `TradeStore` Postgres 구현.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use journal_core::{
    BrokerConnection, CanonicalTrade, ConnectionStatus, ExecutionLink, StoreError, SyncRun,
    SyncRunStatus, TradeStore,
};

use super::{
    ConnectionRepository, ExecutionLinkRepository, SyncRunRepository, TradeRepository,
};

/// sqlx/Postgres 기반 [`TradeStore`] 구현.
///
/// 각 메서드는 해당 Repository에 위임합니다.
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn get_connection(&self, id: Uuid) -> Result<Option<BrokerConnection>, StoreError> {
        ConnectionRepository::get(&self.pool, id)
            .await
            .map_err(StoreError::Database)
    }

    async fn update_connection_status(
        &self,
        id: Uuid,
        status: ConnectionStatus,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        ConnectionRepository::update_status(&self.pool, id, status, message)
            .await
            .map_err(db_err)
    }

    async fn complete_connection_sync(
        &self,
        id: Uuid,
        last_sync_at: DateTime<Utc>,
        new_trades: i64,
    ) -> Result<(), StoreError> {
        ConnectionRepository::complete_sync(&self.pool, id, last_sync_at, new_trades)
            .await
            .map_err(db_err)
    }

    async fn insert_sync_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        SyncRunRepository::insert(&self.pool, run).await.map_err(db_err)
    }

    async fn complete_sync_run(
        &self,
        id: Uuid,
        status: SyncRunStatus,
        trades_synced: i32,
        trades_skipped: i32,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        SyncRunRepository::complete(
            &self.pool,
            id,
            status,
            trades_synced,
            trades_skipped,
            error_message,
        )
        .await
        .map_err(db_err)
    }

    async fn insert_trades(&self, trades: &[CanonicalTrade]) -> Result<(), StoreError> {
        TradeRepository::insert_many(&self.pool, trades)
            .await
            .map_err(db_err)
    }

    async fn find_linked_execution_ids(
        &self,
        connection_id: Uuid,
        execution_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        ExecutionLinkRepository::find_linked(&self.pool, connection_id, execution_ids)
            .await
            .map_err(db_err)
    }

    async fn insert_execution_links(&self, links: &[ExecutionLink]) -> Result<(), StoreError> {
        ExecutionLinkRepository::insert_many(&self.pool, links)
            .await
            .map_err(db_err)
    }
}
