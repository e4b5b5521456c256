//! Types shared by every crate in the marketplace workspace.
//!
//! * [`Money`] is an amount of the settlement currency, counted in minor units (kobo, cents, ...).
//! * [`Secret`] wraps configuration values that must never end up in a log line.
pub mod helpers;
mod money;

pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
