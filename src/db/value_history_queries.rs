use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ValuePoint;

pub async fn fetch_since(pool: &PgPool, user_id: Uuid, since: NaiveDate) -> Result<Vec<ValuePoint>, sqlx::Error> {
    sqlx::query_as::<_, ValuePoint>(
        r#"
        SELECT date, total_value
        FROM portfolio_value_history
        WHERE user_id = $1 AND date >= $2
        ORDER BY date ASC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await
}

pub async fn upsert(pool: &PgPool, user_id: Uuid, point: ValuePoint) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO portfolio_value_history (user_id, date, total_value)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, date)
        DO UPDATE SET total_value = EXCLUDED.total_value, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(point.date)
    .bind(point.total_value)
    .execute(pool)
    .await?;

    Ok(())
}
