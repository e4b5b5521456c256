use std::fmt::Display;

use order_engine::{
    db_types::{Payment, Sku},
    CheckoutDetails,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The body of `POST /api/orders`. The order is built from the caller's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub idempotency_key: String,
    pub shipping_address: String,
    #[serde(default)]
    pub billing_address: Option<String>,
    pub payment_method: String,
}

impl CreateOrderRequest {
    pub fn details(&self) -> CheckoutDetails {
        let details = CheckoutDetails::new(&self.shipping_address, &self.payment_method);
        match &self.billing_address {
            Some(address) => details.with_billing_address(address),
            None => details,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub tx_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartUpdateRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

impl CartUpdateRequest {
    pub fn sku(&self) -> Sku {
        Sku::new(&self.product_id, self.variant_id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustRequest {
    pub delta: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// What the client needs to send the customer to the payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkResponse {
    pub payment_link: String,
    pub tx_ref: String,
}

impl From<Payment> for PaymentLinkResponse {
    fn from(payment: Payment) -> Self {
        Self { payment_link: payment.payment_link, tx_ref: payment.tx_ref }
    }
}
