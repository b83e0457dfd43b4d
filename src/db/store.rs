use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{NewOperation, Position, ValuePoint, WatchlistItem};

/// Row-level access the engine needs from persistent storage. Object safe so
/// it can live in shared state as `Arc<dyn PortfolioStore>`.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn fetch_positions(&self, user_id: Uuid) -> Result<Vec<Position>, sqlx::Error>;

    /// Watched symbols are excluded from recommendations.
    async fn fetch_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, sqlx::Error>;

    /// Daily total values on or after `since`, ascending by date.
    async fn fetch_value_history(&self, user_id: Uuid, since: NaiveDate) -> Result<Vec<ValuePoint>, sqlx::Error>;

    /// Upsert by (user, date).
    async fn record_value_snapshot(&self, user_id: Uuid, point: ValuePoint) -> Result<(), sqlx::Error>;

    async fn append_operation(&self, user_id: Uuid, operation: NewOperation) -> Result<(), sqlx::Error>;
}
