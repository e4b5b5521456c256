use std::sync::Arc;

use log::*;
use market_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{ApiResponse, PaymentLink, PaymentRequest, RefundData, RefundRequest, TransactionData},
    helpers::format_gateway_amount,
    GatewayApiError,
};

/// A thin client for the payment provider's REST API.
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("💳 Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| self.request_error(e))?;
        if response.status().is_success() {
            trace!("💳 REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Asks the provider for a hosted payment page for this transaction.
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentLink, GatewayApiError> {
        let tx_ref = request.tx_ref.clone();
        let request = request.with_redirect_url(self.config.redirect_url.clone());
        debug!("💳 Requesting a payment link for {tx_ref}");
        let response = self
            .rest_query::<ApiResponse<PaymentLink>, PaymentRequest>(Method::POST, "/payments", &[], Some(request))
            .await?;
        let link = response.into_data()?;
        info!("💳 Payment link issued for {tx_ref}");
        Ok(link)
    }

    /// Fetches the current state of the transaction with our reference `tx_ref`.
    pub async fn verify_by_reference(&self, tx_ref: &str) -> Result<TransactionData, GatewayApiError> {
        debug!("💳 Verifying transaction {tx_ref}");
        let response = self
            .rest_query::<ApiResponse<TransactionData>, ()>(
                Method::GET,
                "/transactions/verify_by_reference",
                &[("tx_ref", tx_ref)],
                None,
            )
            .await?;
        let data = response.into_data()?;
        debug!("💳 Transaction {tx_ref} is {}", data.status);
        Ok(data)
    }

    /// Refunds `amount` of the provider transaction `transaction_id`.
    pub async fn refund(&self, transaction_id: &str, amount: Money) -> Result<RefundData, GatewayApiError> {
        let path = format!("/transactions/{transaction_id}/refund");
        let body = RefundRequest { amount: format_gateway_amount(amount) };
        debug!("💳 Requesting a refund of {amount} for transaction {transaction_id}");
        let response =
            self.rest_query::<ApiResponse<RefundData>, RefundRequest>(Method::POST, &path, &[], Some(body)).await?;
        let data = response.into_data()?;
        info!("💳 Refund {} for transaction {transaction_id} is {}", data.id, data.status);
        Ok(data)
    }

    fn request_error(&self, e: reqwest::Error) -> GatewayApiError {
        if e.is_timeout() {
            warn!("💳 Payment provider timed out. {e}");
            GatewayApiError::Timeout(self.config.timeout.as_secs())
        } else if e.is_connect() || e.is_request() {
            warn!("💳 Could not reach the payment provider. {e}");
            GatewayApiError::ConnectionError(e.to_string())
        } else {
            GatewayApiError::RestResponseError(e.to_string())
        }
    }
}
