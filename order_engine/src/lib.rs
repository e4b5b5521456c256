//! Marketplace Order Engine
//!
//! This library contains the order lifecycle and payment reconciliation logic of the marketplace. It turns carts into
//! immutable orders, keeps the stock ledger consistent, starts payments with an external provider and reconciles the
//! provider's reports against orders. It is provider-agnostic: the payment gateway is anything that implements
//! [`traits::PaymentProvider`].
//!
//! The library is divided into three main sections:
//! 1. Storage ([`traits`] and [`sqlite`]). The traits define what a backend must do; [`SqliteDatabase`] is the
//!    backend shipped with the engine. You should not need to call the backend directly. The exception is the data
//!    types in [`db_types`], which are public.
//! 2. The public API ([`mod@oe_api`]): [`CheckoutApi`], [`CatalogApi`], [`PaymentApi`], [`ReconciliationApi`],
//!    [`OrderFlowApi`] and [`ReviewApi`].
//! 3. Events ([`events`]). The APIs publish an event after each committed state change, and you can hook into them.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod oe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use oe_api::{
    access::AccessScope,
    catalog_api::CatalogApi,
    checkout_api::CheckoutApi,
    checkout_objects::{CartSnapshot, CheckoutDetails, CheckoutOptions, PricedLine, PricingPolicy},
    errors::{CheckoutError, OrderFlowError, PaymentError, ReconcileError},
    order_flow_api::{Annulment, OrderDetail, OrderFlowApi, RefundStockPolicy},
    payment_api::PaymentApi,
    reconciliation_api::ReconciliationApi,
    reconciliation_objects::{ReconcileOutcome, ReconcileResult, ReportSource, WebhookReceipt},
    refunds::RefundState,
    review_api::ReviewApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
