use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{IdempotencyClaim, IdempotencyRecord, OrderId};

/// Claims the idempotency key for `order_id`.
///
/// This is an insert-if-absent. An expired claim is taken over. Returns `false` if a live claim already exists, in
/// which case nothing was written.
pub async fn claim(
    claim: &IdempotencyClaim,
    order_id: &OrderId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO idempotency_keys (scope, key, owner_id, order_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (scope, key) DO UPDATE SET
                owner_id = excluded.owner_id,
                order_id = excluded.order_id,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            WHERE idempotency_keys.expires_at <= excluded.created_at
        "#,
    )
    .bind(&claim.scope)
    .bind(&claim.key)
    .bind(&claim.owner_id)
    .bind(order_id.as_str())
    .bind(now)
    .bind(claim.expires_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_live(
    scope: &str,
    key: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
    let record = sqlx::query_as("SELECT * FROM idempotency_keys WHERE scope = $1 AND key = $2 AND expires_at > $3")
        .bind(scope)
        .bind(key)
        .bind(now)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

pub async fn purge_expired(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at <= $1").bind(now).execute(conn).await?;
    Ok(result.rows_affected())
}
