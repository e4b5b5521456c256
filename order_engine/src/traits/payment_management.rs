use thiserror::Error;

use crate::{
    db_types::{NewPayment, OrderId, Payment},
    helpers::is_transient,
    traits::data_objects::SettleOutcome,
};

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The database is busy or unreachable. Retrying later may succeed.
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("No payment exists for transaction reference {0}")]
    PaymentNotFound(String),
    #[error("Order {0} already has a payment in flight or settled")]
    PaymentAlreadyExists(OrderId),
    #[error("Payment {tx_ref} refers to order {order_id}, which does not exist")]
    OrderNotFound { tx_ref: String, order_id: OrderId },
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient(&e) {
            PaymentStoreError::StoreUnavailable(e.to_string())
        } else {
            PaymentStoreError::DatabaseError(e.to_string())
        }
    }
}

/// Persistence of payment attempts.
///
/// The transition methods are compare-and-swap operations on the payment status. They return `None` (or
/// [`SettleOutcome::Stale`]) when the guard fails because another caller already moved the payment on.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Stores a new `Pending` payment. An order can only have one `Pending` payment at a time, so a concurrent
    /// duplicate fails with [`PaymentStoreError::PaymentAlreadyExists`].
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;

    async fn fetch_payment_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;

    /// All payment attempts for the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError>;

    async fn fetch_pending_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError>;

    /// The payment that took the money for this order (`Completed` or `Refunded`), if any.
    async fn fetch_settled_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError>;

    /// `Pending` -> `Failed`.
    async fn fail_payment(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;

    /// In one atomic unit of work: payment `Pending` -> `Completed`, then order `Pending` -> `Confirmed`.
    ///
    /// If the payment guard fails, nothing is written and [`SettleOutcome::Stale`] is returned. If the payment guard
    /// succeeds but the order is no longer `Pending`, the payment stays `Completed` and
    /// [`SettleOutcome::OrderNotPayable`] is returned so that the caller can return the money.
    async fn settle_payment(
        &self,
        tx_ref: &str,
        provider_tx_id: Option<String>,
    ) -> Result<SettleOutcome, PaymentStoreError>;

    /// `Completed` -> `Refunded`.
    async fn mark_payment_refunded(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;
}
