use std::sync::{Arc, Mutex};

use crate::{
    db_types::{Money, Payment},
    traits::{GatewayError, IntentRequest, PaymentIntent, PaymentProvider, ProviderReport, RefundReceipt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    CreateIntent(String),
    Verify(String),
    Refund(String),
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<ProviderCall>,
    reports: Vec<ProviderReport>,
    fail_intents: bool,
    fail_refunds: bool,
}

/// An in-memory payment provider.
///
/// It hands out links for every intent, answers verification from the reports it has been given, and records every
/// call so tests can assert on them. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakePaymentProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakePaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider will answer `verify(tx_ref)` with this report.
    pub fn set_report(&self, tx_ref: &str, status: &str, amount: Money, currency: &str) {
        let report = ProviderReport {
            tx_ref: tx_ref.to_string(),
            status: status.to_string(),
            amount,
            currency: currency.to_string(),
            provider_tx_id: Some(format!("flw-{tx_ref}")),
        };
        let mut state = self.state.lock().unwrap();
        state.reports.retain(|r| r.tx_ref != tx_ref);
        state.reports.push(report);
    }

    pub fn fail_intents(&self, fail: bool) {
        self.state.lock().unwrap().fail_intents = fail;
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.state.lock().unwrap().fail_refunds = fail;
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn refund_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, ProviderCall::Refund(_))).count()
    }

    pub fn intent_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, ProviderCall::CreateIntent(_))).count()
    }
}

impl PaymentProvider for FakePaymentProvider {
    async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::CreateIntent(request.tx_ref.clone()));
        if state.fail_intents {
            return Err(GatewayError::Unavailable("timed out".into()));
        }
        Ok(PaymentIntent {
            payment_link: format!("https://checkout.example.test/pay/{}", request.tx_ref),
            tx_ref: request.tx_ref.clone(),
        })
    }

    async fn verify(&self, tx_ref: &str) -> Result<ProviderReport, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Verify(tx_ref.to_string()));
        state
            .reports
            .iter()
            .find(|r| r.tx_ref == tx_ref)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("No transaction found for {tx_ref}")))
    }

    async fn refund(&self, payment: &Payment) -> Result<RefundReceipt, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProviderCall::Refund(payment.tx_ref.clone()));
        if state.fail_refunds {
            return Err(GatewayError::Unavailable("connection reset".into()));
        }
        Ok(RefundReceipt { refund_id: format!("rf-{}", payment.tx_ref), status: "completed".into() })
    }
}
