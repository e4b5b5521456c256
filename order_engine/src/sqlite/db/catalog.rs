use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db_types::{CartLine, CatalogItem, Sku};

pub async fn upsert_catalog_item(item: CatalogItem, conn: &mut SqliteConnection) -> Result<CatalogItem, sqlx::Error> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO catalog_items (sku, product_id, variant_id, vendor_id, title, unit_price, currency, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (sku) DO UPDATE SET
                product_id = excluded.product_id,
                variant_id = excluded.variant_id,
                vendor_id = excluded.vendor_id,
                title = excluded.title,
                unit_price = excluded.unit_price,
                currency = excluded.currency,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(item.sku)
    .bind(item.product_id)
    .bind(item.variant_id)
    .bind(item.vendor_id)
    .bind(item.title)
    .bind(item.unit_price)
    .bind(item.currency)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_catalog_items(skus: &[Sku], conn: &mut SqliteConnection) -> Result<Vec<CatalogItem>, sqlx::Error> {
    if skus.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM catalog_items WHERE sku IN (");
    push_sku_list(&mut builder, skus);
    builder.push(") ORDER BY sku");
    let items = builder.build_query_as().fetch_all(conn).await?;
    Ok(items)
}

pub async fn fetch_cart(owner_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, sqlx::Error> {
    let lines = sqlx::query_as("SELECT * FROM cart_items WHERE owner_id = $1 ORDER BY sku")
        .bind(owner_id)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

/// Sets the quantity for a line in the owner's cart. A zero quantity deletes the line.
pub async fn set_cart_quantity(
    owner_id: &str,
    sku: &Sku,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    if quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND sku = $2")
            .bind(owner_id)
            .bind(sku.as_str())
            .execute(conn)
            .await?;
        trace!("🗃️ Removed {sku} from the cart of {owner_id}");
        return Ok(());
    }
    sqlx::query(
        r#"
            INSERT INTO cart_items (owner_id, sku, quantity, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner_id, sku) DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
        "#,
    )
    .bind(owner_id)
    .bind(sku.as_str())
    .bind(quantity)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    trace!("🗃️ Cart of {owner_id} now holds {quantity} x {sku}");
    Ok(())
}

/// Removes the given SKUs from the owner's cart, typically because they have just been ordered.
pub async fn remove_cart_lines(owner_id: &str, skus: &[Sku], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if skus.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM cart_items WHERE owner_id = ");
    builder.push_bind(owner_id.to_string());
    builder.push(" AND sku IN (");
    push_sku_list(&mut builder, skus);
    builder.push(")");
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

pub(crate) fn push_sku_list(builder: &mut QueryBuilder<'_, Sqlite>, skus: &[Sku]) {
    let mut list = builder.separated(", ");
    for sku in skus {
        list.push_bind(sku.as_str().to_string());
    }
}
