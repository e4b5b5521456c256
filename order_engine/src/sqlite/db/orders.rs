use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatusType};

/// Inserts a new order header into the database using the given connection. This is not atomic. Embed the call in
/// a transaction together with the items and stock movements, and pass `&mut tx` as the connection argument.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                owner_id,
                status,
                subtotal,
                tax,
                shipping_cost,
                total,
                currency,
                shipping_address,
                billing_address,
                payment_method,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.owner_id)
    .bind(OrderStatusType::Pending)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping_cost)
    .bind(order.total)
    .bind(&order.currency)
    .bind(&order.shipping_address)
    .bind(&order.billing_address)
    .bind(&order.payment_method)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn insert_order_items(
    order_id: &OrderId,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }
    let mut builder = QueryBuilder::<Sqlite>::new(
        "INSERT INTO order_items (order_id, product_id, variant_id, sku, vendor_id, title, quantity, unit_price, \
         line_total) ",
    );
    builder.push_values(items, |mut row, item| {
        row.push_bind(order_id.as_str().to_string())
            .push_bind(item.product_id.clone())
            .push_bind(item.variant_id.clone())
            .push_bind(item.sku.as_str().to_string())
            .push_bind(item.vendor_id.clone())
            .push_bind(item.title.clone())
            .push_bind(item.quantity)
            .push_bind(item.unit_price)
            .push_bind(item.line_total());
    });
    builder.build().execute(conn).await?;
    trace!("🗃️ {} items saved for order {order_id}", items.len());
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_orders_for_owner(owner_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE owner_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(owner_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Compare-and-swap on the order status. The order moves to `to` only if its current status is one of `from`.
///
/// Returns the updated order, or `None` if the guard failed (or the order does not exist).
pub async fn update_order_status(
    order_id: &OrderId,
    from: &[OrderStatusType],
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str().to_string());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    builder.push(") RETURNING *");
    let order: Option<Order> = builder.build_query_as().fetch_optional(conn).await?;
    match &order {
        Some(_) => trace!("🗃️ Order {order_id} moved to {to}"),
        None => trace!("🗃️ Order {order_id} was not in any of {from:?}. It was not moved to {to}"),
    }
    Ok(order)
}

pub async fn fetch_stale_pending_orders(
    created_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE status = $1 AND created_at < $2 ORDER BY created_at")
        .bind(OrderStatusType::Pending)
        .bind(created_before)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}
