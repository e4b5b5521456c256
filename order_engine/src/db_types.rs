//! Data types that are shared between the database backends and the public API.
//!
//! Every amount of money is a [`Money`] value in minor units of the settlement currency.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use market_common::Money;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The stable, externally visible identifier of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a new order id, e.g. `ORD-20240907-5f3a9c1e`.
    pub fn generate() -> Self {
        let suffix: u32 = rand::thread_rng().gen();
        Self(format!("ORD-{}-{suffix:08x}", Utc::now().format("%Y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ConversionError("An order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------          Sku          ---------------------------------------------------------
/// A stock keeping unit: the product id, or `product_id/variant_id` for variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Sku(pub String);

impl Sku {
    pub fn new(product_id: &str, variant_id: Option<&str>) -> Self {
        match variant_id {
            Some(v) if !v.is_empty() => Self(format!("{product_id}/{v}")),
            _ => Self(product_id.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn product_id(&self) -> &str {
        self.0.split_once('/').map(|(p, _)| p).unwrap_or(&self.0)
    }

    pub fn variant_id(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, v)| v)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Vendor => write!(f, "vendor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created and stock is reserved, but no payment has been taken.
    Pending,
    /// Payment has been reconciled against the order.
    Confirmed,
    /// A vendor has started fulfilling the order.
    Processing,
    /// The order was cancelled by the owner, an admin, or the unpaid-order expiry job.
    Cancelled,
    /// The payment for a confirmed order has been returned to the customer.
    Refunded,
}

impl OrderStatusType {
    /// Cancelled and Refunded orders never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Processing" => Ok(Self::Processing),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// A payment link has been issued and the provider has not reported back yet.
    Pending,
    /// The provider confirmed the full amount.
    Completed,
    /// The provider reported a failure, or the reported amount did not match.
    Failed,
    /// The money has been returned to the customer.
    Refunded,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      CatalogItem      ---------------------------------------------------------
/// The authoritative price and ownership of a SKU, as published by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CatalogItem {
    pub sku: Sku,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub vendor_id: String,
    pub title: String,
    pub unit_price: Money,
    pub currency: String,
}

impl CatalogItem {
    pub fn new(product_id: &str, variant_id: Option<&str>, vendor_id: &str, title: &str, unit_price: Money) -> Self {
        Self {
            sku: Sku::new(product_id, variant_id),
            product_id: product_id.to_string(),
            variant_id: variant_id.map(String::from),
            vendor_id: vendor_id.to_string(),
            title: title.to_string(),
            unit_price,
            currency: market_common::DEFAULT_CURRENCY_CODE.to_string(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }
}

//--------------------------------------       CartLine        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartLine {
    pub owner_id: String,
    pub sku: Sku,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      StockLevel       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku: Sku,
    pub available: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum MovementReason {
    /// Stock taken by a newly created order
    Sale,
    /// Stock returned by a cancelled or refunded order
    Restore,
    /// Manual correction by an administrator
    Adjustment,
}

impl Display for MovementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementReason::Sale => write!(f, "Sale"),
            MovementReason::Restore => write!(f, "Restore"),
            MovementReason::Adjustment => write!(f, "Adjustment"),
        }
    }
}

/// A single signed change to the available quantity of a SKU.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub sku: Sku,
    pub order_id: Option<OrderId>,
    pub delta: i64,
    pub reason: MovementReason,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub owner_id: String,
    pub status: OrderStatusType,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub currency: String,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub sku: Sku,
    pub vendor_id: String,
    pub title: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub sku: Sku,
    pub vendor_id: String,
    pub title: String,
    pub quantity: i64,
    /// The price captured from the catalog when the order was priced
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// An order that is ready to be written. The amounts are fixed at this point and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub owner_id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub currency: String,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// True if the header totals agree with each other and with the items.
    ///
    /// Any amount that overflows makes the order inconsistent.
    pub fn is_consistent(&self) -> bool {
        let line_totals = self.items.iter().map(|i| i.unit_price.checked_mul(i.quantity)).collect::<Option<Vec<_>>>();
        let items_total = line_totals.and_then(Money::checked_sum);
        let total = Money::checked_sum([self.subtotal, self.tax, self.shipping_cost]);
        !self.items.is_empty() &&
            self.items.iter().all(|i| i.quantity > 0) &&
            items_total == Some(self.subtotal) &&
            total == Some(self.total)
    }
}

/// The idempotency key under which a new order is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyClaim {
    pub scope: String,
    pub key: String,
    pub owner_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IdempotencyRecord {
    pub scope: String,
    pub key: String,
    pub owner_id: String,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub payment_id: String,
    pub order_id: OrderId,
    pub tx_ref: String,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_link: String,
    pub provider_tx_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub payment_id: String,
    pub order_id: OrderId,
    pub tx_ref: String,
    pub amount: Money,
    pub currency: String,
    pub payment_link: String,
}

impl NewPayment {
    pub fn new(order: &Order, tx_ref: String, payment_link: String) -> Self {
        let suffix: u64 = rand::thread_rng().gen();
        Self {
            payment_id: format!("PAY-{suffix:016x}"),
            order_id: order.order_id.clone(),
            tx_ref,
            amount: order.total,
            currency: order.currency.clone(),
            payment_link,
        }
    }
}

//--------------------------------------      Review flags     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ReviewReason {
    /// The provider reported a different amount or currency than the payment was issued for
    AmountMismatch,
    /// A report arrived for a transaction reference that the engine never issued
    UnknownTransaction,
    /// The provider reported success for a payment that had already failed
    LateSuccessOnFailedPayment,
    /// Money was taken for an order that was no longer awaiting payment
    OrderNotPayable,
    /// Returning money to the customer failed and must be completed by hand
    RefundFailed,
    /// A webhook arrived with a missing or invalid signature
    InvalidSignature,
}

impl Display for ReviewReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReviewReason::AmountMismatch => "AmountMismatch",
            ReviewReason::UnknownTransaction => "UnknownTransaction",
            ReviewReason::LateSuccessOnFailedPayment => "LateSuccessOnFailedPayment",
            ReviewReason::OrderNotPayable => "OrderNotPayable",
            ReviewReason::RefundFailed => "RefundFailed",
            ReviewReason::InvalidSignature => "InvalidSignature",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub id: i64,
    pub reason: ReviewReason,
    pub tx_ref: Option<String>,
    pub order_id: Option<OrderId>,
    pub details: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReviewFlag {
    pub reason: ReviewReason,
    pub tx_ref: Option<String>,
    pub order_id: Option<OrderId>,
    pub details: String,
}

impl NewReviewFlag {
    pub fn new<S: Into<String>>(reason: ReviewReason, details: S) -> Self {
        Self { reason, tx_ref: None, order_id: None, details: details.into() }
    }

    pub fn with_tx_ref(mut self, tx_ref: &str) -> Self {
        self.tx_ref = Some(tx_ref.to_string());
        self
    }

    pub fn with_order_id(mut self, order_id: &OrderId) -> Self {
        self.order_id = Some(order_id.clone());
        self
    }
}

//--------------------------------------     Gateway events    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: i64,
    pub event: String,
    pub tx_ref: String,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    pub payload: String,
    pub outcome: Option<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGatewayEvent {
    pub event: String,
    pub tx_ref: String,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    /// The raw body exactly as the provider signed it
    pub payload: String,
}
