use thiserror::Error;

use crate::{
    db_types::{GatewayEvent, NewGatewayEvent, NewReviewFlag, ReviewFlag},
    helpers::is_transient,
};

#[derive(Debug, Clone, Error)]
pub enum ReviewStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// The database is busy or unreachable. Retrying later may succeed.
    #[error("The database is temporarily unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Review flag #{0} does not exist")]
    FlagNotFound(i64),
    #[error("Gateway event #{0} does not exist")]
    EventNotFound(i64),
}

impl From<sqlx::Error> for ReviewStoreError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient(&e) {
            ReviewStoreError::StoreUnavailable(e.to_string())
        } else {
            ReviewStoreError::DatabaseError(e.to_string())
        }
    }
}

/// The manual review queue, and the durable journal of payment provider webhook deliveries.
#[allow(async_fn_in_trait)]
pub trait ReviewManagement {
    async fn insert_review_flag(&self, flag: NewReviewFlag) -> Result<ReviewFlag, ReviewStoreError>;

    async fn fetch_unresolved_flags(&self) -> Result<Vec<ReviewFlag>, ReviewStoreError>;

    async fn fetch_flags_for_tx_ref(&self, tx_ref: &str) -> Result<Vec<ReviewFlag>, ReviewStoreError>;

    async fn resolve_review_flag(&self, id: i64) -> Result<ReviewFlag, ReviewStoreError>;

    async fn insert_gateway_event(&self, event: NewGatewayEvent) -> Result<GatewayEvent, ReviewStoreError>;

    async fn set_gateway_event_outcome(&self, id: i64, outcome: &str) -> Result<(), ReviewStoreError>;

    async fn fetch_gateway_events(&self, tx_ref: &str) -> Result<Vec<GatewayEvent>, ReviewStoreError>;
}
