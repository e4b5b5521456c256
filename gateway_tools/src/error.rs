use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The payment provider did not answer within {0} seconds")]
    Timeout(u64),
    #[error("Could not reach the payment provider: {0}")]
    ConnectionError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The payment provider returned an error: {0}")]
    ProviderError(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl GatewayApiError {
    /// Timeouts, connection failures and 5xx responses are worth retrying. Everything else will fail the same way
    /// again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ConnectionError(_) => true,
            Self::QueryError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
