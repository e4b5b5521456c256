//! # Order engine public API
//!
//! The `oe_api` module exposes the programmatic API of the order engine. Each API is a thin, stateless struct over a
//! storage backend (and, where money moves, a [`crate::traits::PaymentProvider`]):
//!
//! * [`checkout_api`] prices the cart and turns it into an immutable order, idempotently.
//! * [`catalog_api`] maintains carts and lets administrators correct stock.
//! * [`payment_api`] issues payment links for pending orders.
//! * [`reconciliation_api`] applies provider reports (webhooks and client verification) to payments and orders.
//! * [`order_flow_api`] handles cancellation, refunds, fulfilment and the expiry of unpaid orders.
//! * [`review_api`] exposes the manual review queue.
//!
//! ```rust,ignore
//! use order_engine::{CheckoutApi, PricingPolicy, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url("sqlite://data/market_store.db", 25).await?;
//! let api = CheckoutApi::new(db, PricingPolicy::default(), EventProducers::default());
//! let snapshot = api.build_snapshot("alice").await?;
//! ```
pub mod access;
pub mod catalog_api;
pub mod checkout_api;
pub mod checkout_objects;
pub mod errors;
pub mod order_flow_api;
pub mod payment_api;
pub mod reconciliation_api;
pub mod reconciliation_objects;
pub mod refunds;
pub mod review_api;
