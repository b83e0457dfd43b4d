use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::store::PortfolioStore;
use crate::db::{operation_log_queries, position_queries, value_history_queries, watchlist_queries};
use crate::models::{NewOperation, Position, ValuePoint, WatchlistItem};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PortfolioStore for PgStore {
    async fn fetch_positions(&self, user_id: Uuid) -> Result<Vec<Position>, sqlx::Error> {
        position_queries::fetch_for_user(&self.pool, user_id).await
    }

    async fn fetch_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, sqlx::Error> {
        watchlist_queries::fetch_for_user(&self.pool, user_id).await
    }

    async fn fetch_value_history(&self, user_id: Uuid, since: NaiveDate) -> Result<Vec<ValuePoint>, sqlx::Error> {
        value_history_queries::fetch_since(&self.pool, user_id, since).await
    }

    async fn record_value_snapshot(&self, user_id: Uuid, point: ValuePoint) -> Result<(), sqlx::Error> {
        value_history_queries::upsert(&self.pool, user_id, point).await
    }

    async fn append_operation(&self, user_id: Uuid, operation: NewOperation) -> Result<(), sqlx::Error> {
        operation_log_queries::append(&self.pool, user_id, &operation).await
    }
}
