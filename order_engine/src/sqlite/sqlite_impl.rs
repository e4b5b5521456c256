//! `SqliteDatabase` is the SQLite backend for the order engine.
//!
//! It implements all the storage traits defined in the [`crate::traits`] module. Multi-step operations run inside a
//! single transaction and only commit once every step has succeeded.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{catalog, db_url, idempotency, new_pool, orders, payments, reviews, stock};
use crate::{
    db_types::{
        CartLine,
        CatalogItem,
        GatewayEvent,
        IdempotencyClaim,
        NewGatewayEvent,
        NewOrder,
        NewPayment,
        NewReviewFlag,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        Payment,
        PaymentStatus,
        ReviewFlag,
        Sku,
        StockLevel,
        StockMovement,
    },
    traits::{
        AnnulledOrder,
        CatalogError,
        CatalogManagement,
        InsertOrderResult,
        OrderManagement,
        OrderStoreError,
        PaymentManagement,
        PaymentStoreError,
        ReviewManagement,
        ReviewStoreError,
        SettleOutcome,
        MAX_CART_QUANTITY,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the URL in `MKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<CatalogItem, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let item = catalog::upsert_catalog_item(item, &mut conn).await?;
        Ok(item)
    }

    async fn fetch_catalog_items(&self, skus: &[Sku]) -> Result<Vec<CatalogItem>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let items = catalog::fetch_catalog_items(skus, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_cart(&self, owner_id: &str) -> Result<Vec<CartLine>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let cart = catalog::fetch_cart(owner_id, &mut conn).await?;
        Ok(cart)
    }

    async fn set_cart_quantity(
        &self,
        owner_id: &str,
        sku: &Sku,
        quantity: i64,
    ) -> Result<Vec<CartLine>, CatalogError> {
        if !(0..=MAX_CART_QUANTITY).contains(&quantity) {
            return Err(CatalogError::InvalidQuantity(quantity));
        }
        let mut tx = self.pool.begin().await?;
        catalog::set_cart_quantity(owner_id, sku, quantity, &mut tx).await?;
        let cart = catalog::fetch_cart(owner_id, &mut tx).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn fetch_stock_levels(&self, skus: &[Sku]) -> Result<Vec<StockLevel>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let levels = stock::fetch_stock_levels(skus, &mut conn).await?;
        Ok(levels)
    }

    async fn adjust_stock(&self, sku: &Sku, delta: i64, note: Option<String>) -> Result<StockLevel, CatalogError> {
        let mut tx = self.pool.begin().await?;
        match stock::adjust_stock(sku, delta, note, &mut tx).await? {
            Some(level) => {
                tx.commit().await?;
                info!("🗃️ Stock of {sku} adjusted by {delta}. {} units are now available", level.available);
                Ok(level)
            },
            None => {
                let available = stock::fetch_stock_level(sku, &mut tx).await?.map(|l| l.available).unwrap_or_default();
                tx.rollback().await?;
                warn!("🗃️ Rejected stock adjustment of {delta} for {sku}. Only {available} units are available");
                Err(CatalogError::NegativeStock { sku: sku.clone(), available, delta })
            },
        }
    }

    async fn fetch_stock_movements(&self, sku: &Sku) -> Result<Vec<StockMovement>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let movements = stock::fetch_movements(sku, &mut conn).await?;
        Ok(movements)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_idempotent_order(
        &self,
        scope: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let Some(record) = idempotency::fetch_live(scope, key, now, &mut conn).await? else {
            return Ok(None);
        };
        let order = orders::fetch_order_by_order_id(&record.order_id, &mut conn).await?;
        Ok(order)
    }

    async fn insert_order(
        &self,
        order: NewOrder,
        claim: IdempotencyClaim,
    ) -> Result<InsertOrderResult, OrderStoreError> {
        if !order.is_consistent() {
            return Err(OrderStoreError::InvalidOrder(format!(
                "The totals of order {} do not add up, or it has no items",
                order.order_id
            )));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if !idempotency::claim(&claim, &order.order_id, now, &mut tx).await? {
            let record = idempotency::fetch_live(&claim.scope, &claim.key, now, &mut tx).await?;
            let existing = match record {
                Some(r) => orders::fetch_order_by_order_id(&r.order_id, &mut tx).await?,
                None => None,
            };
            tx.rollback().await?;
            return match existing {
                Some(order) => {
                    debug!("🗃️ Idempotency key {} already used for order {}", claim.key, order.order_id);
                    Ok(InsertOrderResult::Replayed(order))
                },
                None => Err(OrderStoreError::DatabaseError(format!(
                    "Idempotency key {} is claimed but its order cannot be found",
                    claim.key
                ))),
            };
        }
        for item in &order.items {
            if !stock::take_stock(&item.sku, item.quantity, &order.order_id, &mut tx).await? {
                tx.rollback().await?;
                info!("🗃️ Order {} rejected. Not enough stock of {}", order.order_id, item.sku);
                return Err(OrderStoreError::InsufficientStock(item.sku.clone()));
            }
        }
        let inserted = orders::insert_order(&order, &mut tx).await?;
        orders::insert_order_items(&inserted.order_id, &order.items, &mut tx).await?;
        let skus = order.items.iter().map(|i| i.sku.clone()).collect::<Vec<_>>();
        catalog::remove_cart_lines(&order.owner_id, &skus, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} created for {}. Total {} {}", inserted.order_id, inserted.owner_id, inserted.total, inserted.currency);
        Ok(InsertOrderResult::Inserted(inserted))
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_orders_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_owner(owner_id, &mut conn).await?;
        Ok(orders)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError> {
        self.annul_order(order_id, &[OrderStatusType::Pending, OrderStatusType::Confirmed]).await
    }

    async fn expire_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError> {
        self.annul_order(order_id, &[OrderStatusType::Pending]).await
    }

    async fn refund_order(&self, order_id: &OrderId, restock: bool) -> Result<AnnulledOrder, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let refunded =
            orders::update_order_status(order_id, &[OrderStatusType::Confirmed], OrderStatusType::Refunded, &mut tx)
                .await?;
        let Some(order) = refunded else {
            let current = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
            tx.rollback().await?;
            return Err(rejected(order_id, current, OrderStatusType::Refunded));
        };
        let restored = if restock { restore_items(order_id, &mut tx).await? } else { Vec::new() };
        tx.commit().await?;
        info!("🗃️ Order {order_id} refunded. {} lines restocked", restored.len());
        Ok(AnnulledOrder { order, previous_status: OrderStatusType::Confirmed, restored })
    }

    async fn mark_order_processing(&self, order_id: &OrderId) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            orders::update_order_status(order_id, &[OrderStatusType::Confirmed], OrderStatusType::Processing, &mut tx)
                .await?;
        match updated {
            Some(order) => {
                tx.commit().await?;
                Ok(order)
            },
            None => {
                let current = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
                tx.rollback().await?;
                Err(rejected(order_id, current, OrderStatusType::Processing))
            },
        }
    }

    async fn fetch_stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_stale_pending_orders(created_before, &mut conn).await?;
        Ok(orders)
    }

    async fn purge_expired_idempotency_keys(&self, now: DateTime<Utc>) -> Result<u64, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let count = idempotency::purge_expired(now, &mut conn).await?;
        Ok(count)
    }
}

impl SqliteDatabase {
    /// Cancels the order if it is in one of the `from` states, restoring every item to the ledger.
    ///
    /// Each state is tried in turn so that the caller learns which one the order was in.
    async fn annul_order(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
    ) -> Result<AnnulledOrder, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let mut cancelled = None;
        for status in from {
            let order = orders::update_order_status(order_id, &[*status], OrderStatusType::Cancelled, &mut tx).await?;
            if let Some(order) = order {
                cancelled = Some((order, *status));
                break;
            }
        }
        let Some((order, previous_status)) = cancelled else {
            let current = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
            tx.rollback().await?;
            return Err(rejected(order_id, current, OrderStatusType::Cancelled));
        };
        let restored = restore_items(order_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} cancelled (was {previous_status}). {} lines restocked", restored.len());
        Ok(AnnulledOrder { order, previous_status, restored })
    }
}

fn rejected(order_id: &OrderId, current: Option<Order>, target: OrderStatusType) -> OrderStoreError {
    match current {
        Some(o) => OrderStoreError::StatusTransitionRejected { order_id: o.order_id, status: o.status, target },
        None => OrderStoreError::OrderNotFound(order_id.clone()),
    }
}

async fn restore_items(
    order_id: &OrderId,
    conn: &mut sqlx::SqliteConnection,
) -> Result<Vec<StockMovement>, sqlx::Error> {
    let items = orders::fetch_order_items(order_id, &mut *conn).await?;
    let mut restored = Vec::with_capacity(items.len());
    for item in items {
        let movement = stock::restore_stock(&item.sku, item.quantity, order_id, &mut *conn).await?;
        restored.push(movement);
    }
    Ok(restored)
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError> {
        let order_id = payment.order_id.clone();
        let mut conn = self.pool.acquire().await?;
        match payments::insert_payment(payment, &mut conn).await {
            Ok(p) => Ok(p),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("🗃️ Order {order_id} already has a pending payment");
                Err(PaymentStoreError::PaymentAlreadyExists(order_id))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_payment_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_tx_ref(tx_ref, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_pending_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_with_status(order_id, &[PaymentStatus::Pending], &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_settled_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let statuses = [PaymentStatus::Completed, PaymentStatus::Refunded];
        let payment = payments::fetch_payment_with_status(order_id, &statuses, &mut conn).await?;
        Ok(payment)
    }

    async fn fail_payment(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment =
            payments::update_payment_status(tx_ref, PaymentStatus::Pending, PaymentStatus::Failed, &mut conn).await?;
        Ok(payment)
    }

    async fn settle_payment(
        &self,
        tx_ref: &str,
        provider_tx_id: Option<String>,
    ) -> Result<SettleOutcome, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::complete_payment(tx_ref, provider_tx_id, Utc::now(), &mut tx).await? else {
            let current = payments::fetch_payment_by_tx_ref(tx_ref, &mut tx).await?;
            tx.rollback().await?;
            return match current {
                Some(p) => {
                    debug!("🗃️ Payment [{tx_ref}] is already {}. Nothing to settle", p.status);
                    Ok(SettleOutcome::Stale(p))
                },
                None => Err(PaymentStoreError::PaymentNotFound(tx_ref.to_string())),
            };
        };
        let confirmed = orders::update_order_status(
            &payment.order_id,
            &[OrderStatusType::Pending],
            OrderStatusType::Confirmed,
            &mut tx,
        )
        .await?;
        let outcome = match confirmed {
            Some(order) => {
                info!("🗃️ Payment [{tx_ref}] completed. Order {} is confirmed", order.order_id);
                SettleOutcome::Settled { payment, order }
            },
            None => match orders::fetch_order_by_order_id(&payment.order_id, &mut tx).await? {
                Some(order) => {
                    warn!("🗃️ Payment [{tx_ref}] completed, but order {} is {}", order.order_id, order.status);
                    SettleOutcome::OrderNotPayable { payment, order }
                },
                None => {
                    tx.rollback().await?;
                    return Err(PaymentStoreError::OrderNotFound {
                        tx_ref: tx_ref.to_string(),
                        order_id: payment.order_id,
                    });
                },
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn mark_payment_refunded(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment =
            payments::update_payment_status(tx_ref, PaymentStatus::Completed, PaymentStatus::Refunded, &mut conn)
                .await?;
        Ok(payment)
    }
}

impl ReviewManagement for SqliteDatabase {
    async fn insert_review_flag(&self, flag: NewReviewFlag) -> Result<ReviewFlag, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        let flag = reviews::insert_review_flag(flag, &mut conn).await?;
        warn!("🗃️ Review flag #{} raised: {}. {}", flag.id, flag.reason, flag.details);
        Ok(flag)
    }

    async fn fetch_unresolved_flags(&self) -> Result<Vec<ReviewFlag>, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        let flags = reviews::fetch_unresolved_flags(&mut conn).await?;
        Ok(flags)
    }

    async fn fetch_flags_for_tx_ref(&self, tx_ref: &str) -> Result<Vec<ReviewFlag>, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        let flags = reviews::fetch_flags_for_tx_ref(tx_ref, &mut conn).await?;
        Ok(flags)
    }

    async fn resolve_review_flag(&self, id: i64) -> Result<ReviewFlag, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        reviews::resolve_review_flag(id, &mut conn).await?.ok_or(ReviewStoreError::FlagNotFound(id))
    }

    async fn insert_gateway_event(&self, event: NewGatewayEvent) -> Result<GatewayEvent, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        let event = reviews::insert_gateway_event(event, &mut conn).await?;
        Ok(event)
    }

    async fn set_gateway_event_outcome(&self, id: i64, outcome: &str) -> Result<(), ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        if reviews::set_gateway_event_outcome(id, outcome, &mut conn).await? {
            Ok(())
        } else {
            Err(ReviewStoreError::EventNotFound(id))
        }
    }

    async fn fetch_gateway_events(&self, tx_ref: &str) -> Result<Vec<GatewayEvent>, ReviewStoreError> {
        let mut conn = self.pool.acquire().await?;
        let events = reviews::fetch_gateway_events(tx_ref, &mut conn).await?;
        Ok(events)
    }
}
