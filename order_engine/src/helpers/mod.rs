mod store_errors;
mod tx_ref;
mod validation;

pub use store_errors::is_transient;

pub use tx_ref::new_tx_ref;
pub use validation::{validate_address, validate_idempotency_key, validate_sku, ValidationError};
