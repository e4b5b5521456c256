use std::time::Duration;

use log::*;
use market_common::Secret;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.flutterwave.com/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Every request to the provider is abandoned after this long
    pub timeout: Duration,
    /// Where the provider sends the customer after the hosted payment page
    pub redirect_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            redirect_url: None,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("MKT_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("🪛️ MKT_GATEWAY_URL not set, using {DEFAULT_GATEWAY_URL}");
            DEFAULT_GATEWAY_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("MKT_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ MKT_GATEWAY_SECRET_KEY not set. Calls to the payment provider will be rejected");
            String::default()
        }));
        let timeout = std::env::var("MKT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid MKT_GATEWAY_TIMEOUT_SECS: {s}. {e}. Using the default"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let redirect_url = std::env::var("MKT_GATEWAY_REDIRECT_URL").ok().filter(|s| !s.trim().is_empty());
        if redirect_url.is_none() {
            info!("🪛️ MKT_GATEWAY_REDIRECT_URL not set. Customers stay on the provider's page after paying");
        }
        Self { base_url: base_url.trim_end_matches('/').to_string(), secret_key, timeout, redirect_url }
    }

    pub fn with_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_secret_key<S: Into<String>>(mut self, key: S) -> Self {
        self.secret_key = Secret::new(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
