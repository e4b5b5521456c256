use market_common::Money;
use serde_json::Number;

use crate::GatewayApiError;

/// The provider sends amounts in major units as JSON numbers, e.g. `2000` or `20.5`.
///
/// The conversion goes through the number's decimal text, so `20.5` becomes exactly 2050 minor units. Large or tiny
/// floats are printed in exponent form (`1e16`), which is expanded before it is read.
pub fn parse_gateway_amount(amount: &Number) -> Result<Money, GatewayApiError> {
    let text = plain_decimal(&amount.to_string())?;
    Money::from_decimal_str(&text).map_err(|e| GatewayApiError::InvalidCurrencyAmount(e.to_string()))
}

pub fn format_gateway_amount(amount: Money) -> String {
    amount.to_decimal_string()
}

/// Rewrites scientific notation such as `2.5e3` or `2.5E-1` as plain decimal text. Other input is returned as is.
fn plain_decimal(s: &str) -> Result<String, GatewayApiError> {
    let Some((mantissa, exponent)) = s.split_once(['e', 'E']) else {
        return Ok(s.to_string());
    };
    let invalid = || GatewayApiError::InvalidCurrencyAmount(format!("'{s}' is not a decimal number"));
    let exponent = exponent.parse::<i64>().map_err(|_| invalid())?;
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{whole}{frac}");
    if whole.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Anything this far from the decimal point cannot be a valid amount
    let point = whole.len() as i64 + exponent;
    if !(-40..=40).contains(&point) {
        return Err(GatewayApiError::InvalidCurrencyAmount(format!("'{s}' is out of range")));
    }
    let text = if point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else if point as usize >= digits.len() {
        format!("{digits}{}", "0".repeat(point as usize - digits.len()))
    } else {
        let (whole, frac) = digits.split_at(point as usize);
        format!("{whole}.{frac}")
    };
    Ok(format!("{sign}{text}"))
}
