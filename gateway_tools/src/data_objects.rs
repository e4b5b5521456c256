use chrono::{DateTime, Utc};
use market_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::{helpers::parse_gateway_amount, GatewayApiError};

/// Every provider response is wrapped in this envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> Result<T, GatewayApiError> {
        if self.status != "success" {
            return Err(GatewayApiError::ProviderError(self.message));
        }
        self.data.ok_or_else(|| GatewayApiError::RestResponseError(format!("Response had no data. {}", self.message)))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaymentCustomer {
    /// The provider requires an email, so the owner id stands in when the marketplace has none
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentRequest {
    pub tx_ref: String,
    pub amount: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    pub customer: PaymentCustomer,
    pub meta: serde_json::Value,
}

impl PaymentRequest {
    pub fn new(tx_ref: &str, amount: Money, currency: &str, customer: PaymentCustomer) -> Self {
        Self {
            tx_ref: tx_ref.to_string(),
            amount: amount.to_decimal_string(),
            currency: currency.to_string(),
            redirect_url: None,
            customer,
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_redirect_url(mut self, url: Option<String>) -> Self {
        self.redirect_url = url;
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentLink {
    pub link: String,
}

/// A transaction as the provider reports it from `verify_by_reference`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransactionData {
    pub id: u64,
    pub tx_ref: String,
    pub status: String,
    pub amount: Number,
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TransactionData {
    pub fn amount(&self) -> Result<Money, GatewayApiError> {
        parse_gateway_amount(&self.amount)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefundRequest {
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefundData {
    pub id: u64,
    pub status: String,
}

/// The body of a webhook delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookData {
    /// The provider's own id for the transaction
    #[serde(default)]
    pub id: Option<u64>,
    pub tx_ref: String,
    pub status: String,
    pub amount: Number,
    pub currency: String,
}

impl WebhookData {
    pub fn amount(&self) -> Result<Money, GatewayApiError> {
        parse_gateway_amount(&self.amount)
    }

    pub fn provider_tx_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}
