use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewPayment, OrderId, OrderStatusType, Payment},
    helpers::new_tx_ref,
    oe_api::{
        access::{fetch_order_in_scope, AccessScope},
        errors::PaymentError,
    },
    traits::{IntentRequest, OrderManagement, PaymentManagement, PaymentProvider, PaymentStoreError},
};

/// Starts payment for pending orders.
pub struct PaymentApi<B, P> {
    db: B,
    provider: P,
}

impl<B, P> Debug for PaymentApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, P> PaymentApi<B, P> {
    pub fn new(db: B, provider: P) -> Self {
        Self { db, provider }
    }
}

impl<B, P> PaymentApi<B, P>
where
    B: OrderManagement + PaymentManagement,
    P: PaymentProvider,
{
    /// Returns a hosted payment link for the order.
    ///
    /// Only `Pending` orders can be paid for. If the order already has a `Pending` payment, that payment is returned and
    /// the provider is not called again. Provider failures leave the order untouched.
    pub async fn create_intent(&self, order_id: &OrderId, scope: &AccessScope) -> Result<Payment, PaymentError> {
        let order = fetch_order_in_scope(&self.db, order_id, scope)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::Pending {
            return Err(PaymentError::OrderNotPayable { order_id: order.order_id, status: order.status });
        }
        if let Some(payment) = self.db.fetch_pending_payment(order_id).await? {
            debug!("💳 Order {order_id} already has pending payment [{}]. Reusing it", payment.tx_ref);
            return Ok(payment);
        }
        let request = IntentRequest {
            tx_ref: new_tx_ref(order_id),
            order_id: order.order_id.clone(),
            owner_id: order.owner_id.clone(),
            amount: order.total,
            currency: order.currency.clone(),
        };
        let intent = self.provider.create_intent(&request).await.map_err(|e| {
            warn!("💳 Could not create a payment intent for order {order_id}. {e}");
            e
        })?;
        let payment = NewPayment::new(&order, intent.tx_ref, intent.payment_link);
        match self.db.insert_payment(payment).await {
            Ok(payment) => {
                info!("💳 Payment [{}] for {} {} issued for order {order_id}", payment.tx_ref, payment.amount, payment.currency);
                Ok(payment)
            },
            Err(PaymentStoreError::PaymentAlreadyExists(_)) => {
                debug!("💳 Another request issued a payment for order {order_id} first. Returning that one");
                self.db
                    .fetch_pending_payment(order_id)
                    .await?
                    .ok_or_else(|| PaymentError::DatabaseError(format!("Pending payment for {order_id} disappeared")))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Every payment attempt for the order, oldest first.
    pub async fn payments_for_order(&self, order_id: &OrderId, scope: &AccessScope) -> Result<Vec<Payment>, PaymentError> {
        if fetch_order_in_scope(&self.db, order_id, scope).await?.is_none() {
            return Err(PaymentError::OrderNotFound(order_id.clone()));
        }
        let payments = self.db.fetch_payments_for_order(order_id).await?;
        Ok(payments)
    }
}
