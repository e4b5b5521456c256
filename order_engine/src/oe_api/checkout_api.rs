use std::{collections::HashMap, fmt::Debug};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{IdempotencyClaim, Money, NewOrder, NewOrderItem, Order, OrderId},
    events::{EventProducers, OrderCreatedEvent},
    helpers::{validate_address, validate_idempotency_key},
    oe_api::{
        checkout_objects::{CartSnapshot, CheckoutDetails, CheckoutOptions, PricedLine, PricingPolicy},
        errors::CheckoutError,
    },
    traits::{CatalogManagement, InsertOrderResult, OrderManagement},
};

/// Turns a customer's mutable cart into an immutable order.
///
/// Checkout is idempotent per owner and key: replaying a key that is still live returns the order it created, with no
/// further side effects.
pub struct CheckoutApi<B> {
    db: B,
    pricing: PricingPolicy,
    options: CheckoutOptions,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({:?})", self.pricing)
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, pricing: PricingPolicy, producers: EventProducers) -> Self {
        Self { db, pricing, options: CheckoutOptions::default(), producers }
    }

    pub fn with_options(mut self, options: CheckoutOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

pub(crate) fn idempotency_scope(owner_id: &str) -> String {
    format!("create_order:{owner_id}")
}

impl<B> CheckoutApi<B>
where B: CatalogManagement + OrderManagement
{
    /// Prices the owner's cart from the catalog and checks every line against live stock.
    ///
    /// Cached cart values are never trusted. The snapshot is all-or-nothing: the first line that cannot be supplied
    /// fails the whole snapshot.
    pub async fn build_snapshot(&self, owner_id: &str) -> Result<CartSnapshot, CheckoutError> {
        let cart = self.db.fetch_cart(owner_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let skus = cart.iter().map(|l| l.sku.clone()).collect::<Vec<_>>();
        let catalog = self.db.fetch_catalog_items(&skus).await?;
        let catalog = catalog.into_iter().map(|c| (c.sku.clone(), c)).collect::<HashMap<_, _>>();
        let stock = self.db.fetch_stock_levels(&skus).await?;
        let stock = stock.into_iter().map(|s| (s.sku, s.available)).collect::<HashMap<_, _>>();
        let mut lines = Vec::with_capacity(cart.len());
        for line in cart {
            let available = stock.get(&line.sku).copied().unwrap_or_default();
            let Some(item) = catalog.get(&line.sku) else {
                debug!("🛒 {} is in the cart of {owner_id}, but is no longer in the catalog", line.sku);
                return Err(CheckoutError::UnavailableItem { sku: line.sku, requested: line.quantity, available: 0 });
            };
            if !item.currency.eq_ignore_ascii_case(&self.pricing.currency) {
                return Err(CheckoutError::CurrencyMismatch { sku: line.sku, currency: item.currency.clone() });
            }
            let Some(line_total) = item.unit_price.checked_mul(line.quantity) else {
                warn!("🛒 {} x {} in the cart of {owner_id} cannot be priced", line.quantity, line.sku);
                return Err(CheckoutError::InvalidRequest(format!("The total for {} is too large", line.sku)));
            };
            if available < line.quantity {
                debug!("🛒 {owner_id} wants {} of {}, but only {available} are available", line.quantity, line.sku);
                return Err(CheckoutError::UnavailableItem { sku: line.sku, requested: line.quantity, available });
            }
            lines.push(PricedLine {
                sku: line.sku,
                product_id: item.product_id.clone(),
                variant_id: item.variant_id.clone(),
                vendor_id: item.vendor_id.clone(),
                title: item.title.clone(),
                quantity: line.quantity,
                unit_price: item.unit_price,
                line_total,
                available,
            });
        }
        let too_large = || CheckoutError::InvalidRequest("The order total is too large".into());
        let subtotal = Money::checked_sum(lines.iter().map(|l| l.line_total)).ok_or_else(too_large)?;
        let tax = self.pricing.tax(subtotal);
        let shipping_cost = self.pricing.shipping(subtotal);
        let total = Money::checked_sum([subtotal, tax, shipping_cost]).ok_or_else(too_large)?;
        let snapshot = CartSnapshot {
            owner_id: owner_id.to_string(),
            currency: self.pricing.currency.clone(),
            lines,
            subtotal,
            tax,
            shipping_cost,
            total,
        };
        trace!("🛒 Cart snapshot for {owner_id}: {} lines, total {}", snapshot.lines.len(), snapshot.total);
        Ok(snapshot)
    }

    /// Returns the order created under this owner's idempotency key, if the key is still live.
    pub async fn fetch_replay(&self, owner_id: &str, idempotency_key: &str) -> Result<Option<Order>, CheckoutError> {
        let scope = idempotency_scope(owner_id);
        let order = self.db.fetch_idempotent_order(&scope, idempotency_key, Utc::now()).await?;
        Ok(order)
    }

    /// Creates a `Pending` order from a snapshot.
    ///
    /// Claiming the key, taking stock for every line and writing the order happen in one unit of work. If any line
    /// cannot be supplied, nothing is written and [`CheckoutError::InsufficientStock`] names the line.
    pub async fn create_order(
        &self,
        owner_id: &str,
        snapshot: CartSnapshot,
        details: CheckoutDetails,
        idempotency_key: &str,
    ) -> Result<InsertOrderResult, CheckoutError> {
        validate_idempotency_key(idempotency_key)?;
        if let Some(order) = self.fetch_replay(owner_id, idempotency_key).await? {
            info!("🛒 Replaying checkout {idempotency_key} for {owner_id}. Order {} already exists", order.order_id);
            return Ok(InsertOrderResult::Replayed(order));
        }
        if snapshot.owner_id != owner_id {
            return Err(CheckoutError::InvalidRequest("The cart snapshot belongs to someone else".into()));
        }
        if snapshot.lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let order = self.new_order(snapshot, details)?;
        let now = Utc::now();
        let claim = IdempotencyClaim {
            scope: idempotency_scope(owner_id),
            key: idempotency_key.to_string(),
            owner_id: owner_id.to_string(),
            expires_at: now + self.options.idempotency_ttl,
        };
        let result = self.db.insert_order(order, claim).await?;
        match &result {
            InsertOrderResult::Inserted(order) => {
                info!("🛒 Order {} placed by {owner_id} for {} {}", order.order_id, order.total, order.currency);
                let items = self.db.fetch_order_items(&order.order_id).await?;
                self.producers.publish_order_created(OrderCreatedEvent::new(order.clone(), items)).await;
            },
            InsertOrderResult::Replayed(order) => {
                info!("🛒 Checkout {idempotency_key} raced with itself. Returning order {}", order.order_id);
            },
        }
        Ok(result)
    }

    /// Snapshot and create in one call, replaying a live idempotency key before looking at the cart.
    pub async fn checkout(
        &self,
        owner_id: &str,
        details: CheckoutDetails,
        idempotency_key: &str,
    ) -> Result<InsertOrderResult, CheckoutError> {
        validate_idempotency_key(idempotency_key)?;
        if let Some(order) = self.fetch_replay(owner_id, idempotency_key).await? {
            info!("🛒 Replaying checkout {idempotency_key} for {owner_id}. Order {} already exists", order.order_id);
            return Ok(InsertOrderResult::Replayed(order));
        }
        let snapshot = self.build_snapshot(owner_id).await?;
        self.create_order(owner_id, snapshot, details, idempotency_key).await
    }

    fn new_order(&self, snapshot: CartSnapshot, details: CheckoutDetails) -> Result<NewOrder, CheckoutError> {
        let shipping_address = validate_address(&details.shipping_address, "shipping")?;
        let billing_address = match details.billing_address.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => Some(validate_address(a, "billing")?),
            _ => None,
        };
        let payment_method = details.payment_method.trim().to_string();
        if payment_method.is_empty() {
            return Err(CheckoutError::InvalidRequest("A payment method is required".into()));
        }
        let items = snapshot.lines.iter().map(NewOrderItem::from).collect::<Vec<_>>();
        let order = NewOrder {
            order_id: OrderId::generate(),
            owner_id: snapshot.owner_id,
            subtotal: snapshot.subtotal,
            tax: snapshot.tax,
            shipping_cost: snapshot.shipping_cost,
            total: snapshot.total,
            currency: snapshot.currency,
            shipping_address,
            billing_address,
            payment_method,
            created_at: Utc::now(),
            items,
        };
        if !order.is_consistent() {
            return Err(CheckoutError::InvalidRequest("The cart snapshot totals do not add up".into()));
        }
        Ok(order)
    }
}
