use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{GatewayEvent, NewGatewayEvent, NewReviewFlag, ReviewFlag};

pub async fn insert_review_flag(flag: NewReviewFlag, conn: &mut SqliteConnection) -> Result<ReviewFlag, sqlx::Error> {
    let flag = sqlx::query_as(
        r#"
            INSERT INTO review_flags (reason, tx_ref, order_id, details, resolved, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            RETURNING *;
        "#,
    )
    .bind(flag.reason)
    .bind(flag.tx_ref)
    .bind(flag.order_id.map(|o| o.0))
    .bind(flag.details)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(flag)
}

pub async fn fetch_unresolved_flags(conn: &mut SqliteConnection) -> Result<Vec<ReviewFlag>, sqlx::Error> {
    let flags = sqlx::query_as("SELECT * FROM review_flags WHERE resolved = FALSE ORDER BY id").fetch_all(conn).await?;
    Ok(flags)
}

pub async fn fetch_flags_for_tx_ref(tx_ref: &str, conn: &mut SqliteConnection) -> Result<Vec<ReviewFlag>, sqlx::Error> {
    let flags =
        sqlx::query_as("SELECT * FROM review_flags WHERE tx_ref = $1 ORDER BY id").bind(tx_ref).fetch_all(conn).await?;
    Ok(flags)
}

pub async fn resolve_review_flag(id: i64, conn: &mut SqliteConnection) -> Result<Option<ReviewFlag>, sqlx::Error> {
    let flag = sqlx::query_as(
        "UPDATE review_flags SET resolved = TRUE, resolved_at = COALESCE(resolved_at, $1) WHERE id = $2 RETURNING *",
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(flag)
}

pub async fn insert_gateway_event(
    event: NewGatewayEvent,
    conn: &mut SqliteConnection,
) -> Result<GatewayEvent, sqlx::Error> {
    let event = sqlx::query_as(
        r#"
            INSERT INTO gateway_events (event, tx_ref, status, amount, currency, payload, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(event.event)
    .bind(event.tx_ref)
    .bind(event.status)
    .bind(event.amount)
    .bind(event.currency)
    .bind(event.payload)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(event)
}

pub async fn set_gateway_event_outcome(id: i64, outcome: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE gateway_events SET outcome = $1 WHERE id = $2").bind(outcome).bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_gateway_events(tx_ref: &str, conn: &mut SqliteConnection) -> Result<Vec<GatewayEvent>, sqlx::Error> {
    let events =
        sqlx::query_as("SELECT * FROM gateway_events WHERE tx_ref = $1 ORDER BY id").bind(tx_ref).fetch_all(conn).await?;
    Ok(events)
}
