use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Position;

pub async fn fetch_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as::<_, Position>(
        r#"
        SELECT symbol, shares, acquisition_price, account_type, locked
        FROM positions
        WHERE user_id = $1
        ORDER BY symbol ASC, account_type ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
