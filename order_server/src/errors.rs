use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::*;
use order_engine::{
    helpers::ValidationError,
    traits::{CatalogError, GatewayError, ReviewStoreError},
    CheckoutError,
    OrderFlowError,
    PaymentError,
    ReconcileError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    /// The detail is logged, never returned to the caller.
    #[error("An error occurred on the backend of the server.")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The service is temporarily unavailable. Try again later.")]
    ServiceUnavailable(String),
    #[error("The payment provider refused the request. {0}")]
    GatewayRejected(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingIdentity | AuthError::InvalidIdentity(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) | AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
                AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::BackendError(detail) => error!("💻️ Backend error: {detail}"),
            Self::ServiceUnavailable(detail) => warn!("💻️ Service unavailable: {detail}"),
            _ => {},
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No caller identity was supplied.")]
    MissingIdentity,
    #[error("The caller identity is invalid. {0}")]
    InvalidIdentity(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Missing or invalid webhook signature.")]
    InvalidSignature,
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(s) => Self::ServiceUnavailable(s),
            GatewayError::Rejected(s) | GatewayError::InvalidResponse(s) => Self::GatewayRejected(s),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        Self::ValidationError(e.to_string())
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::DatabaseError(s) => Self::BackendError(s),
            CheckoutError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            CheckoutError::InsufficientStock(_) => Self::Conflict(e.to_string()),
            CheckoutError::EmptyCart |
            CheckoutError::UnavailableItem { .. } |
            CheckoutError::CurrencyMismatch { .. } |
            CheckoutError::InvalidRequest(_) => Self::ValidationError(e.to_string()),
        }
    }
}

impl From<PaymentError> for ServerError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::DatabaseError(s) => Self::BackendError(s),
            PaymentError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            PaymentError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            PaymentError::OrderNotPayable { .. } => Self::ValidationError(e.to_string()),
            PaymentError::Gateway(g) => g.into(),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::DatabaseError(s) => Self::BackendError(s),
            ReconcileError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            ReconcileError::UnknownTransaction(_) => Self::NoRecordFound(e.to_string()),
            ReconcileError::AmountMismatch { .. } => Self::Conflict(e.to_string()),
            ReconcileError::Gateway(g) => g.into(),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(s) => Self::BackendError(s),
            OrderFlowError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::OrderNotCancellable { .. } => Self::ValidationError(e.to_string()),
            OrderFlowError::TransitionRejected { .. } | OrderFlowError::PaymentNotRefundable(_) => {
                Self::Conflict(e.to_string())
            },
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::DatabaseError(s) => Self::BackendError(s),
            CatalogError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            CatalogError::SkuNotFound(_) => Self::NoRecordFound(e.to_string()),
            CatalogError::InvalidQuantity(_) => Self::ValidationError(e.to_string()),
            CatalogError::NegativeStock { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<ReviewStoreError> for ServerError {
    fn from(e: ReviewStoreError) -> Self {
        match e {
            ReviewStoreError::DatabaseError(s) => Self::BackendError(s),
            ReviewStoreError::StoreUnavailable(s) => Self::ServiceUnavailable(s),
            ReviewStoreError::FlagNotFound(_) | ReviewStoreError::EventNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
        }
    }
}
