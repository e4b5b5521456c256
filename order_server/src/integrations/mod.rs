//! Adapters between the order engine and outside services.
mod gateway;

pub use gateway::HttpPaymentProvider;
