use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusType, Payment, ReviewFlag};

/// A new order was committed and stock was taken for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderCreatedEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }
}

/// Payment for the order was reconciled and the order is now `Confirmed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub payment: Payment,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnulmentReason {
    /// Cancelled on request, with the caller's reason if one was given
    Cancelled(Option<String>),
    /// Cancelled by the expiry worker because it was never paid
    Expired,
    Refunded,
}

/// The order reached a terminal state. `restocked` is the number of item lines returned to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub reason: AnnulmentReason,
    pub restocked: usize,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order, previous_status: OrderStatusType, reason: AnnulmentReason, restocked: usize) -> Self {
        Self { order, previous_status, reason, restocked }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFlaggedEvent {
    pub flag: ReviewFlag,
}

/// A webhook delivery failed signature verification. Nothing in it was acted upon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRejectedEvent {
    pub remote_ip: Option<String>,
    pub details: String,
}

impl SignatureRejectedEvent {
    pub fn new<S: Into<String>>(remote_ip: Option<String>, details: S) -> Self {
        Self { remote_ip, details: details.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderConfirmed(OrderConfirmedEvent),
    OrderAnnulled(OrderAnnulledEvent),
    ReviewFlagged(ReviewFlaggedEvent),
    SignatureRejected(SignatureRejectedEvent),
}
