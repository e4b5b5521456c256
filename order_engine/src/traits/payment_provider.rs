use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, OrderId, Payment};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment provider is unavailable. {0}")]
    Unavailable(String),
    #[error("The payment provider rejected the request. {0}")]
    Rejected(String),
    #[error("The payment provider sent a response that could not be understood. {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Timeouts, connection failures and provider-side errors can be retried. Rejections cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Our reference for this payment attempt. The provider echoes it back in every report.
    pub tx_ref: String,
    pub order_id: OrderId,
    pub owner_id: String,
    pub amount: Money,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_link: String,
    pub tx_ref: String,
}

/// What the provider says happened to a transaction, whether pushed by webhook or pulled by verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub tx_ref: String,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    pub provider_tx_id: Option<String>,
}

impl ProviderReport {
    pub fn is_successful(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("successful")
    }

    /// Amount and currency must match exactly. Currency codes are compared case-insensitively.
    pub fn matches(&self, payment: &Payment) -> bool {
        self.amount == payment.amount && self.currency.trim().eq_ignore_ascii_case(payment.currency.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: String,
}

/// The payment gateway.
///
/// Implementations must bound every call with a timeout and report timeouts, connection failures and provider-side
/// errors as [`GatewayError::Unavailable`].
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// Asks the provider for a hosted payment link for the given amount.
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError>;

    /// Asks the provider for the current state of the transaction with our reference `tx_ref`.
    async fn verify(&self, tx_ref: &str) -> Result<ProviderReport, GatewayError>;

    /// Returns the full amount of a completed payment to the customer.
    async fn refund(&self, payment: &Payment) -> Result<RefundReceipt, GatewayError>;
}
