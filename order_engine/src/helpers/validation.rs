use regex::Regex;
use thiserror::Error;

use crate::db_types::Sku;

const MAX_ADDRESS_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Idempotency keys must be 8 to 128 characters of letters, digits, '-', '_' or ':'")]
    InvalidIdempotencyKey,
    #[error("'{0}' is not a valid SKU")]
    InvalidSku(String),
    #[error("The {0} address is missing or invalid")]
    InvalidAddress(&'static str),
}

fn matches(pattern: &str, s: &str) -> bool {
    Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
}

pub fn validate_idempotency_key(key: &str) -> Result<(), ValidationError> {
    if matches(r"^[A-Za-z0-9_:\-]{8,128}$", key) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdempotencyKey)
    }
}

/// A SKU is a product id, optionally followed by `/` and a variant id.
pub fn validate_sku(sku: &str) -> Result<Sku, ValidationError> {
    if matches(r"^[A-Za-z0-9_.\-]{1,64}(/[A-Za-z0-9_.\-]{1,64})?$", sku) {
        Ok(Sku::from(sku))
    } else {
        Err(ValidationError::InvalidSku(sku.to_string()))
    }
}

/// Returns the trimmed address. `kind` names the address in the error, e.g. "shipping".
pub fn validate_address(address: &str, kind: &'static str) -> Result<String, ValidationError> {
    let address = address.trim();
    if address.len() < 5 || address.len() > MAX_ADDRESS_LEN || address.chars().any(char::is_control) {
        return Err(ValidationError::InvalidAddress(kind));
    }
    Ok(address.to_string())
}
