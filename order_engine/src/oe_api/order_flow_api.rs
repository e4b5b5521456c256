use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderItem, OrderStatusType, PaymentStatus, StockMovement},
    events::{AnnulmentReason, EventProducers, OrderAnnulledEvent},
    oe_api::{
        access::{fetch_order_in_scope, AccessScope},
        errors::OrderFlowError,
        refunds::{refund_payment, RefundState},
    },
    traits::{ExpiryResult, OrderManagement, OrderStoreError, PaymentManagement, PaymentProvider, ReviewManagement},
};

/// What happens to the stock of a refunded order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundStockPolicy {
    /// The goods are returned to sale
    #[default]
    Restock,
    /// The goods are not coming back, e.g. they were already shipped
    Retain,
}

/// A cancelled or refunded order, the stock returned for it, and what happened to its money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annulment {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub restored: Vec<StockMovement>,
    pub refund: RefundState,
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order state changes after checkout: cancellation, refunds, fulfilment and expiry.
///
/// Every change is a guarded transition in the store. Money is returned only after the order's new state has been
/// committed.
pub struct OrderFlowApi<B, P> {
    db: B,
    provider: P,
    producers: EventProducers,
    refund_policy: RefundStockPolicy,
}

impl<B, P> Debug for OrderFlowApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.refund_policy)
    }
}

impl<B, P> OrderFlowApi<B, P> {
    pub fn new(db: B, provider: P, producers: EventProducers) -> Self {
        Self { db, provider, producers, refund_policy: RefundStockPolicy::default() }
    }

    pub fn with_refund_policy(mut self, policy: RefundStockPolicy) -> Self {
        self.refund_policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> OrderFlowApi<B, P>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    pub async fn fetch_order(&self, order_id: &OrderId, scope: &AccessScope) -> Result<OrderDetail, OrderFlowError> {
        let order = self.order_in_scope(order_id, scope).await?;
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn orders_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_owner(owner_id).await?;
        Ok(orders)
    }

    /// Cancels a `Pending` or `Confirmed` order and returns its stock to the ledger.
    ///
    /// If the order was `Confirmed`, its payment is refunded once the cancellation has been committed. Cancelling an
    /// order that is already cancelled fails with [`OrderFlowError::OrderNotCancellable`] and restores nothing.
    pub async fn cancel_order(
        &self,
        order_id: &OrderId,
        reason: Option<String>,
        scope: &AccessScope,
    ) -> Result<Annulment, OrderFlowError> {
        let order = self.order_in_scope(order_id, scope).await?;
        if !order.status.is_cancellable() {
            return Err(OrderFlowError::OrderNotCancellable { order_id: order.order_id, status: order.status });
        }
        let annulled = self.db.cancel_order(order_id).await?;
        let refund = match annulled.previous_status {
            OrderStatusType::Confirmed => self.refund_settled_payment(order_id).await?,
            _ => RefundState::NotRequired,
        };
        info!(
            "🛒 Order {order_id} cancelled ({}). Was {}",
            reason.as_deref().unwrap_or("no reason given"),
            annulled.previous_status
        );
        let event = OrderAnnulledEvent::new(
            annulled.order.clone(),
            annulled.previous_status,
            AnnulmentReason::Cancelled(reason),
            annulled.restored.len(),
        );
        self.producers.publish_order_annulled(event).await;
        Ok(Annulment {
            order: annulled.order,
            previous_status: annulled.previous_status,
            restored: annulled.restored,
            refund,
        })
    }

    /// Refunds a `Confirmed` order. Stock goes back to the ledger according to the refund stock policy.
    pub async fn refund_order(&self, order_id: &OrderId) -> Result<Annulment, OrderFlowError> {
        let order = self.order_in_scope(order_id, &AccessScope::Any).await?;
        if order.status != OrderStatusType::Confirmed {
            return Err(OrderFlowError::TransitionRejected {
                order_id: order.order_id,
                status: order.status,
                target: OrderStatusType::Refunded,
            });
        }
        match self.db.fetch_settled_payment(order_id).await? {
            Some(p) if p.status == PaymentStatus::Completed => {},
            _ => return Err(OrderFlowError::PaymentNotRefundable(order_id.clone())),
        }
        let restock = self.refund_policy == RefundStockPolicy::Restock;
        let annulled = self.db.refund_order(order_id, restock).await?;
        let refund = self.refund_settled_payment(order_id).await?;
        let event = OrderAnnulledEvent::new(
            annulled.order.clone(),
            annulled.previous_status,
            AnnulmentReason::Refunded,
            annulled.restored.len(),
        );
        self.producers.publish_order_annulled(event).await;
        Ok(Annulment {
            order: annulled.order,
            previous_status: annulled.previous_status,
            restored: annulled.restored,
            refund,
        })
    }

    /// Moves a `Confirmed` order to `Processing`.
    pub async fn start_processing(&self, order_id: &OrderId, scope: &AccessScope) -> Result<Order, OrderFlowError> {
        self.order_in_scope(order_id, scope).await?;
        let order = self.db.mark_order_processing(order_id).await?;
        info!("🛒 Order {order_id} is being processed");
        Ok(order)
    }

    /// Cancels every `Pending` order older than `unpaid_timeout` and restores its stock, then drops expired
    /// idempotency keys.
    ///
    /// An order that is paid for while this runs is left alone; the guarded transition simply skips it.
    pub async fn expire_unpaid_orders(&self, unpaid_timeout: Duration) -> Result<ExpiryResult, OrderFlowError> {
        let now = Utc::now();
        let stale = self.db.fetch_stale_pending_orders(now - unpaid_timeout).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            match self.db.expire_order(&order.order_id).await {
                Ok(annulled) => {
                    debug!("🕰️ Order {} expired. {} lines restocked", order.order_id, annulled.restored.len());
                    let event = OrderAnnulledEvent::new(
                        annulled.order.clone(),
                        annulled.previous_status,
                        AnnulmentReason::Expired,
                        annulled.restored.len(),
                    );
                    self.producers.publish_order_annulled(event).await;
                    expired.push(annulled.order);
                },
                Err(OrderStoreError::StatusTransitionRejected { order_id, status, .. }) => {
                    debug!("🕰️ Order {order_id} is now {status}. Skipping");
                },
                Err(e) => return Err(e.into()),
            }
        }
        let purged_keys = self.db.purge_expired_idempotency_keys(now).await?;
        Ok(ExpiryResult::new(expired, purged_keys))
    }

    async fn order_in_scope(&self, order_id: &OrderId, scope: &AccessScope) -> Result<Order, OrderFlowError> {
        fetch_order_in_scope(&self.db, order_id, scope)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    async fn refund_settled_payment(&self, order_id: &OrderId) -> Result<RefundState, OrderFlowError> {
        match self.db.fetch_settled_payment(order_id).await? {
            Some(payment) => Ok(refund_payment(&self.db, &self.provider, &self.producers, payment).await),
            None => {
                warn!("💳 Order {order_id} was confirmed without a settled payment. There is nothing to refund");
                Ok(RefundState::NotRequired)
            },
        }
    }
}
