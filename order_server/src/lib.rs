//! # Marketplace order server
//! This crate hosts the HTTP front end of the marketplace order engine. It is responsible for:
//! * Turning carts into orders and starting payments with the payment provider.
//! * Receiving signed payment notifications from the provider and reconciling them.
//! * Cancellation, refunds, order progression, stock administration and the manual review queue.
//! * Expiring orders that were never paid for.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/gateway/webhook`: Signed payment notifications from the provider.
//! * `/api/...`: Everything else. These routes need the caller identity headers; see [auth](auth/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;

pub mod data_objects;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
