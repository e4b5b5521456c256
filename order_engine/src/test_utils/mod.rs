//! Fixtures for integration tests: throw-away databases, catalog seeding and an in-memory payment provider.
mod fake_provider;
pub mod prepare_env;

pub use fake_provider::{FakePaymentProvider, ProviderCall};
