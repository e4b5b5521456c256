use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::db_types::{Money, NewOrderItem, Sku};

/// How an order's tax and shipping are derived from its subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// The settlement currency. Catalog items priced in anything else cannot be checked out.
    pub currency: String,
    /// Tax, in basis points of the subtotal
    pub tax_rate_bps: u32,
    pub shipping_flat: Money,
    /// Orders whose subtotal reaches this amount ship for free
    pub free_shipping_threshold: Option<Money>,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            currency: market_common::DEFAULT_CURRENCY_CODE.to_string(),
            tax_rate_bps: 0,
            shipping_flat: Money::default(),
            free_shipping_threshold: None,
        }
    }
}

impl PricingPolicy {
    pub fn new(currency: &str) -> Self {
        Self { currency: currency.to_string(), ..Default::default() }
    }

    pub fn with_tax_rate_bps(mut self, bps: u32) -> Self {
        self.tax_rate_bps = bps;
        self
    }

    pub fn with_flat_shipping(mut self, shipping: Money) -> Self {
        self.shipping_flat = shipping;
        self
    }

    pub fn with_free_shipping_threshold(mut self, threshold: Option<Money>) -> Self {
        self.free_shipping_threshold = threshold;
        self
    }

    pub fn tax(&self, subtotal: Money) -> Money {
        subtotal.basis_points(self.tax_rate_bps)
    }

    pub fn shipping(&self, subtotal: Money) -> Money {
        match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Money::default(),
            _ => self.shipping_flat,
        }
    }
}

/// Options for [`crate::CheckoutApi`] that are not part of pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutOptions {
    /// How long a checkout idempotency key stays live
    pub idempotency_ttl: Duration,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self { idempotency_ttl: Duration::hours(24) }
    }
}

/// Everything the customer supplies at checkout, apart from the cart itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDetails {
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    pub payment_method: String,
}

impl CheckoutDetails {
    pub fn new(shipping_address: &str, payment_method: &str) -> Self {
        Self {
            shipping_address: shipping_address.to_string(),
            billing_address: None,
            payment_method: payment_method.to_string(),
        }
    }

    pub fn with_billing_address(mut self, address: &str) -> Self {
        self.billing_address = Some(address.to_string());
        self
    }
}

/// A cart line, re-priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub sku: Sku,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub vendor_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    /// Live stock at the time the snapshot was taken
    pub available: i64,
}

impl From<&PricedLine> for NewOrderItem {
    fn from(line: &PricedLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            variant_id: line.variant_id.clone(),
            sku: line.sku.clone(),
            vendor_id: line.vendor_id.clone(),
            title: line.title.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// The owner's cart, fully priced against the catalog and checked against live stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub owner_id: String,
    pub currency: String,
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
}
