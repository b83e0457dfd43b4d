use sqlx::PgPool;
use uuid::Uuid;

use crate::models::WatchlistItem;

pub async fn fetch_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<WatchlistItem>, sqlx::Error> {
    sqlx::query_as::<_, WatchlistItem>(
        r#"
        SELECT symbol, note
        FROM watchlist_items
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
