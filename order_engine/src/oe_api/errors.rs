use thiserror::Error;

use crate::{
    db_types::{Money, OrderId, OrderStatusType, Sku},
    helpers::ValidationError,
    traits::{CatalogError, GatewayError, OrderStoreError, PaymentStoreError, ReviewStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("{sku} is unavailable. Requested {requested}, but only {available} are available")]
    UnavailableItem { sku: Sku, requested: i64, available: i64 },
    #[error("{sku} is priced in {currency}, which is not the settlement currency")]
    CurrencyMismatch { sku: Sku, currency: String },
    #[error("There is not enough stock of {0} to complete the order")]
    InsufficientStock(Sku),
    #[error("Invalid checkout request. {0}")]
    InvalidRequest(String),
}

impl From<OrderStoreError> for CheckoutError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::InsufficientStock(sku) => Self::InsufficientStock(sku),
            OrderStoreError::InvalidOrder(s) => Self::InvalidRequest(s),
            OrderStoreError::DatabaseError(s) => Self::DatabaseError(s),
            OrderStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => Self::DatabaseError(s),
            CatalogError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::InvalidRequest(e.to_string()),
        }
    }
}

impl From<ValidationError> for CheckoutError {
    fn from(e: ValidationError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status}. Only pending orders can be paid for")]
    OrderNotPayable { order_id: OrderId, status: OrderStatusType },
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl From<OrderStoreError> for PaymentError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<PaymentStoreError> for PaymentError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("No payment was issued with transaction reference {0}")]
    UnknownTransaction(String),
    #[error(
        "Payment {tx_ref} was issued for {expected} {expected_currency}, but the provider reported {reported} \
         {reported_currency}"
    )]
    AmountMismatch {
        tx_ref: String,
        expected: Money,
        expected_currency: String,
        reported: Money,
        reported_currency: String,
    },
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl From<PaymentStoreError> for ReconcileError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::PaymentNotFound(tx_ref) => Self::UnknownTransaction(tx_ref),
            PaymentStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<OrderStoreError> for ReconcileError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<ReviewStoreError> for ReconcileError {
    fn from(e: ReviewStoreError) -> Self {
        match e {
            ReviewStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status} and can no longer be cancelled")]
    OrderNotCancellable { order_id: OrderId, status: OrderStatusType },
    #[error("Order {order_id} is {status} and cannot move to {target}")]
    TransitionRejected { order_id: OrderId, status: OrderStatusType, target: OrderStatusType },
    #[error("Order {0} has no completed payment to refund")]
    PaymentNotRefundable(OrderId),
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            OrderStoreError::StatusTransitionRejected { order_id, status, target } => {
                if target == OrderStatusType::Cancelled {
                    Self::OrderNotCancellable { order_id, status }
                } else {
                    Self::TransitionRejected { order_id, status, target }
                }
            },
            OrderStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<PaymentStoreError> for OrderFlowError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::StoreUnavailable(s) => Self::StoreUnavailable(s),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
