use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{IdempotencyClaim, NewOrder, Order, OrderId, OrderItem, OrderStatusType, Sku},
    helpers::is_transient,
    traits::data_objects::{AnnulledOrder, InsertOrderResult},
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The database is busy or unreachable. Retrying later may succeed.
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("There is not enough stock of {0} to fulfil the order")]
    InsufficientStock(Sku),
    #[error("The order is not valid. {0}")]
    InvalidOrder(String),
    #[error("Order {order_id} is {status} and cannot move to {target}")]
    StatusTransitionRejected { order_id: OrderId, status: OrderStatusType, target: OrderStatusType },
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient(&e) {
            OrderStoreError::StoreUnavailable(e.to_string())
        } else {
            OrderStoreError::DatabaseError(e.to_string())
        }
    }
}

/// Persistence of orders and their state machine.
///
/// Every status change is a compare-and-swap on the current status. A transition whose guard fails returns
/// [`OrderStoreError::StatusTransitionRejected`] and leaves the store untouched.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Returns the order recorded against a live (unexpired) idempotency key, if there is one.
    async fn fetch_idempotent_order(
        &self,
        scope: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, OrderStoreError>;

    /// Creates a `Pending` order in a single atomic unit of work:
    /// * claims the idempotency key. If a live claim already exists, nothing else happens and the order it points to
    ///   is returned as [`InsertOrderResult::Replayed`].
    /// * decrements the stock ledger for every item, conditional on sufficient stock. If any decrement fails,
    ///   everything is rolled back and [`OrderStoreError::InsufficientStock`] is returned.
    /// * writes the order header and items, and removes the purchased lines from the owner's cart.
    async fn insert_order(&self, order: NewOrder, claim: IdempotencyClaim)
        -> Result<InsertOrderResult, OrderStoreError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError>;

    /// All orders for the owner, newest first.
    async fn fetch_orders_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderStoreError>;

    /// Moves a `Pending` or `Confirmed` order to `Cancelled` and returns every item's quantity to the stock ledger, in
    /// one atomic unit of work. Stock is restored exactly once, no matter how often this is called.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError>;

    /// Moves a `Pending` order to `Cancelled` and restores its stock, exactly like [`Self::cancel_order`], but never
    /// touches an order that has been confirmed in the meantime.
    async fn expire_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError>;

    /// Moves a `Confirmed` order to `Refunded`. When `restock` is true, the items are returned to the ledger in the
    /// same unit of work.
    async fn refund_order(&self, order_id: &OrderId, restock: bool) -> Result<AnnulledOrder, OrderStoreError>;

    /// Moves a `Confirmed` order to `Processing`.
    async fn mark_order_processing(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;

    /// `Pending` orders created before the given time.
    async fn fetch_stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;

    /// Deletes idempotency keys that expired before `now`. Returns the number of keys removed.
    async fn purge_expired_idempotency_keys(&self, now: DateTime<Utc>) -> Result<u64, OrderStoreError>;
}
