//! The [`PaymentProvider`] that talks to the hosted payment gateway over HTTP.
use gateway_tools::{GatewayApi, GatewayApiError, GatewayConfig, PaymentCustomer, PaymentRequest, TransactionData};
use log::*;
use order_engine::{
    db_types::Payment,
    traits::{GatewayError, IntentRequest, PaymentIntent, PaymentProvider, ProviderReport, RefundReceipt},
};
use serde_json::json;

const PLACEHOLDER_EMAIL_DOMAIN: &str = "customers.invalid";

#[derive(Clone)]
pub struct HttpPaymentProvider {
    api: GatewayApi,
}

impl HttpPaymentProvider {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let api = GatewayApi::new(config).map_err(|e| GatewayError::Rejected(e.to_string()))?;
        Ok(Self { api })
    }
}

impl PaymentProvider for HttpPaymentProvider {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let customer = PaymentCustomer { email: customer_email(&request.owner_id), name: None };
        let meta = json!({ "order_id": request.order_id.as_str(), "owner_id": request.owner_id });
        let payment = PaymentRequest::new(&request.tx_ref, request.amount, &request.currency, customer)
            .with_redirect_url(self.api.config().redirect_url.clone())
            .with_meta(meta);
        let link = self.api.create_payment(payment).await.map_err(to_gateway_error)?;
        debug!("💳 Payment link for [{}] issued", request.tx_ref);
        Ok(PaymentIntent { payment_link: link.link, tx_ref: request.tx_ref.clone() })
    }

    async fn verify(&self, tx_ref: &str) -> Result<ProviderReport, GatewayError> {
        let tx = self.api.verify_by_reference(tx_ref).await.map_err(to_gateway_error)?;
        transaction_to_report(tx)
    }

    async fn refund(&self, payment: &Payment) -> Result<RefundReceipt, GatewayError> {
        let Some(transaction_id) = payment.provider_tx_id.as_deref() else {
            return Err(GatewayError::Rejected(format!(
                "Payment [{}] has no provider transaction id, so it cannot be refunded automatically",
                payment.tx_ref
            )));
        };
        let refund = self.api.refund(transaction_id, payment.amount).await.map_err(to_gateway_error)?;
        info!("💳 Refund {} for [{}] is {}", refund.id, payment.tx_ref, refund.status);
        Ok(RefundReceipt { refund_id: refund.id.to_string(), status: refund.status })
    }
}

fn customer_email(owner_id: &str) -> String {
    if owner_id.contains('@') {
        owner_id.to_string()
    } else {
        format!("{owner_id}@{PLACEHOLDER_EMAIL_DOMAIN}")
    }
}

fn transaction_to_report(tx: TransactionData) -> Result<ProviderReport, GatewayError> {
    let amount = tx.amount().map_err(to_gateway_error)?;
    Ok(ProviderReport {
        tx_ref: tx.tx_ref,
        status: tx.status,
        amount,
        currency: tx.currency,
        provider_tx_id: Some(tx.id.to_string()),
    })
}

fn to_gateway_error(e: GatewayApiError) -> GatewayError {
    if e.is_retryable() {
        warn!("💳 Payment provider is unavailable. {e}");
        return GatewayError::Unavailable(e.to_string());
    }
    match e {
        GatewayApiError::JsonError(_) | GatewayApiError::RestResponseError(_) | GatewayApiError::InvalidCurrencyAmount(_) => {
            error!("💳 Could not understand the payment provider. {e}");
            GatewayError::InvalidResponse(e.to_string())
        },
        e => {
            warn!("💳 Payment provider refused the request. {e}");
            GatewayError::Rejected(e.to_string())
        },
    }
}

#[cfg(test)]
mod test {
    use market_common::Money;

    use super::*;

    #[test]
    fn customer_emails() {
        assert_eq!(customer_email("ada@example.com"), "ada@example.com");
        assert_eq!(customer_email("cust-42"), "cust-42@customers.invalid");
    }

    #[test]
    fn error_mapping() {
        assert!(to_gateway_error(GatewayApiError::Timeout(10)).is_retryable());
        let e = to_gateway_error(GatewayApiError::QueryError { status: 503, message: "busy".into() });
        assert!(matches!(e, GatewayError::Unavailable(_)));
        let e = to_gateway_error(GatewayApiError::QueryError { status: 400, message: "bad".into() });
        assert!(matches!(e, GatewayError::Rejected(_)));
        let e = to_gateway_error(GatewayApiError::JsonError("eof".into()));
        assert!(matches!(e, GatewayError::InvalidResponse(_)));
    }

    #[test]
    fn transactions_become_reports() {
        let tx: TransactionData = serde_json::from_value(json!({
            "id": 4_411_021,
            "tx_ref": "ord-1-abc",
            "status": "successful",
            "amount": 21.5,
            "currency": "NGN"
        }))
        .unwrap();
        let report = transaction_to_report(tx).unwrap();
        assert_eq!(report.amount, Money::from(2_150));
        assert_eq!(report.provider_tx_id.as_deref(), Some("4411021"));
        assert!(report.is_successful());
    }
}
