use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderItem},
    traits::{OrderManagement, OrderStoreError},
};

/// Whose orders a caller may see and act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    /// Customers see their own orders
    Owner(String),
    /// Vendors see orders that contain at least one of their items
    Vendor(String),
    /// Administrators and internal jobs see everything
    Any,
}

impl AccessScope {
    pub fn permits(&self, order: &Order, items: &[OrderItem]) -> bool {
        match self {
            AccessScope::Owner(owner_id) => &order.owner_id == owner_id,
            AccessScope::Vendor(vendor_id) => items.iter().any(|i| &i.vendor_id == vendor_id),
            AccessScope::Any => true,
        }
    }

    /// True if [`Self::permits`] needs the order's items to decide.
    pub fn needs_items(&self) -> bool {
        matches!(self, AccessScope::Vendor(_))
    }
}

/// Fetches the order, treating an order outside the caller's scope as if it did not exist.
pub(crate) async fn fetch_order_in_scope<B: OrderManagement>(
    db: &B,
    order_id: &OrderId,
    scope: &AccessScope,
) -> Result<Option<Order>, OrderStoreError> {
    let Some(order) = db.fetch_order_by_order_id(order_id).await? else {
        return Ok(None);
    };
    let items = if scope.needs_items() { db.fetch_order_items(order_id).await? } else { Vec::new() };
    Ok(scope.permits(&order, &items).then_some(order))
}
