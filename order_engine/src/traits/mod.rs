//! # Backend contracts
//!
//! This module defines the behaviour that a storage backend must expose to drive the order engine, plus the contract
//! for the external payment provider.
//!
//! * [`CatalogManagement`] reads catalog prices, keeps the owner's cart and is the only writer of the stock ledger
//!   outside of order creation and compensation.
//! * [`OrderManagement`] persists immutable orders and owns the order state machine. Creating an order claims the
//!   idempotency key and decrements stock in the same atomic unit of work.
//! * [`PaymentManagement`] persists payment attempts and performs the guarded (compare-and-swap) payment transitions,
//!   including the combined payment + order transition used by reconciliation.
//! * [`ReviewManagement`] stores the manual review queue and the journal of webhook deliveries.
//! * [`PaymentProvider`] is the payment gateway. The engine never talks to the network directly.
mod catalog_management;
mod data_objects;
mod order_management;
mod payment_management;
mod payment_provider;
mod review_management;

pub use catalog_management::{CatalogError, CatalogManagement, MAX_CART_QUANTITY};
pub use data_objects::{AnnulledOrder, ExpiryResult, InsertOrderResult, SettleOutcome};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_management::{PaymentManagement, PaymentStoreError};
pub use payment_provider::{GatewayError, IntentRequest, PaymentIntent, PaymentProvider, ProviderReport, RefundReceipt};
pub use review_management::{ReviewManagement, ReviewStoreError};
