mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::GatewayApi;
pub use config::{GatewayConfig, DEFAULT_GATEWAY_URL};
pub use data_objects::{
    ApiResponse,
    PaymentCustomer,
    PaymentLink,
    PaymentRequest,
    RefundData,
    RefundRequest,
    TransactionData,
    WebhookData,
    WebhookPayload,
};
pub use error::GatewayApiError;
pub use helpers::{format_gateway_amount, parse_gateway_amount};
