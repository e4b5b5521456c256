use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Payment, StockMovement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOrderResult {
    /// A new order was written and stock was taken for it.
    Inserted(Order),
    /// The idempotency key was already claimed. This is the order it was claimed for; nothing else happened.
    Replayed(Order),
}

impl InsertOrderResult {
    pub fn order(&self) -> &Order {
        match self {
            Self::Inserted(o) | Self::Replayed(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Inserted(o) | Self::Replayed(o) => o,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replayed(_))
    }
}

/// An order that has been cancelled or refunded, along with the stock that was returned for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnulledOrder {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub restored: Vec<StockMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleOutcome {
    Settled { payment: Payment, order: Order },
    OrderNotPayable { payment: Payment, order: Order },
    Stale(Payment),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpiryResult {
    pub expired: Vec<Order>,
    pub purged_keys: u64,
}

impl ExpiryResult {
    pub fn new(expired: Vec<Order>, purged_keys: u64) -> Self {
        Self { expired, purged_keys }
    }

    pub fn expired_count(&self) -> usize {
        self.expired.len()
    }
}
