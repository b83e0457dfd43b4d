use sqlx::PgPool;
use uuid::Uuid;

use crate::models::NewOperation;

// Append-only: no update or delete paths exist for this table.
pub async fn append(pool: &PgPool, user_id: Uuid, operation: &NewOperation) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO operation_logs (id, user_id, kind, detail)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&operation.kind)
    .bind(&operation.detail)
    .execute(pool)
    .await?;

    Ok(())
}
