//! The stock ledger.
//!
//! Every change to `stock_levels.available` is a single conditional statement, so two writers can never both succeed
//! in taking the last unit of a SKU. Every change is journalled in `stock_movements`.
use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::catalog::push_sku_list;
use crate::db_types::{MovementReason, OrderId, Sku, StockLevel, StockMovement};

pub async fn fetch_stock_levels(skus: &[Sku], conn: &mut SqliteConnection) -> Result<Vec<StockLevel>, sqlx::Error> {
    if skus.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM stock_levels WHERE sku IN (");
    push_sku_list(&mut builder, skus);
    builder.push(") ORDER BY sku");
    let levels = builder.build_query_as().fetch_all(conn).await?;
    Ok(levels)
}

pub async fn fetch_stock_level(sku: &Sku, conn: &mut SqliteConnection) -> Result<Option<StockLevel>, sqlx::Error> {
    let level = sqlx::query_as("SELECT * FROM stock_levels WHERE sku = $1").bind(sku.as_str()).fetch_optional(conn).await?;
    Ok(level)
}

/// Takes `quantity` units of `sku` for the given order, but only if that many are available.
///
/// Returns `false`, and changes nothing, if there is not enough stock.
pub async fn take_stock(
    sku: &Sku,
    quantity: i64,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE stock_levels SET available = available - $1, updated_at = $2 WHERE sku = $3 AND available >= $1",
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(sku.as_str())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        trace!("🗃️ Not enough stock of {sku} to take {quantity} units for order {order_id}");
        return Ok(false);
    }
    record_movement(sku, Some(order_id), -quantity, MovementReason::Sale, None, conn).await?;
    trace!("🗃️ Took {quantity} units of {sku} for order {order_id}");
    Ok(true)
}

/// Returns `quantity` units of `sku` to the ledger on behalf of the given order.
///
/// The journal entry is written first. A second restore for the same order and SKU violates the unique index on the
/// journal, so the ledger can never be credited twice for one order.
pub async fn restore_stock(
    sku: &Sku,
    quantity: i64,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<StockMovement, sqlx::Error> {
    let movement = record_movement(sku, Some(order_id), quantity, MovementReason::Restore, None, &mut *conn).await?;
    sqlx::query(
        r#"
            INSERT INTO stock_levels (sku, available, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (sku) DO UPDATE SET available = available + excluded.available, updated_at = excluded.updated_at
        "#,
    )
    .bind(sku.as_str())
    .bind(quantity)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    trace!("🗃️ Restored {quantity} units of {sku} from order {order_id}");
    Ok(movement)
}

/// Applies a manual, signed correction to the ledger. Returns `None` if the change would make the level negative.
pub async fn adjust_stock(
    sku: &Sku,
    delta: i64,
    note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<StockLevel>, sqlx::Error> {
    let now = Utc::now();
    sqlx::query("INSERT INTO stock_levels (sku, available, updated_at) VALUES ($1, 0, $2) ON CONFLICT (sku) DO NOTHING")
        .bind(sku.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let level: Option<StockLevel> = sqlx::query_as(
        r#"
            UPDATE stock_levels SET available = available + $1, updated_at = $2
            WHERE sku = $3 AND available + $1 >= 0
            RETURNING *;
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(sku.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    if level.is_some() {
        record_movement(sku, None, delta, MovementReason::Adjustment, note, conn).await?;
    }
    Ok(level)
}

pub async fn fetch_movements(sku: &Sku, conn: &mut SqliteConnection) -> Result<Vec<StockMovement>, sqlx::Error> {
    let movements = sqlx::query_as("SELECT * FROM stock_movements WHERE sku = $1 ORDER BY id")
        .bind(sku.as_str())
        .fetch_all(conn)
        .await?;
    Ok(movements)
}

async fn record_movement(
    sku: &Sku,
    order_id: Option<&OrderId>,
    delta: i64,
    reason: MovementReason,
    note: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<StockMovement, sqlx::Error> {
    let movement = sqlx::query_as(
        r#"
            INSERT INTO stock_movements (sku, order_id, delta, reason, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(sku.as_str())
    .bind(order_id.map(|o| o.as_str().to_string()))
    .bind(delta)
    .bind(reason)
    .bind(note)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(movement)
}
