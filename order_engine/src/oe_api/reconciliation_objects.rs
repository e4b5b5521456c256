use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{GatewayEvent, Order, Payment},
    oe_api::{errors::ReconcileError, refunds::RefundState},
};

/// Where a provider report came from. Both sources go through exactly the same reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    /// Pushed by the provider
    Webhook,
    /// Pulled from the provider when the customer returns from the payment page
    ClientVerify,
}

impl Display for ReportSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportSource::Webhook => write!(f, "webhook"),
            ReportSource::ClientVerify => write!(f, "client verification"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// This report completed the payment and confirmed the order
    Confirmed,
    /// The payment had already been settled. Nothing changed.
    AlreadySettled,
    /// The provider reported a failure. The payment is `Failed`; the order can be paid for again.
    PaymentFailed,
    /// The provider reported success for a payment that had already failed. Nothing changed; it was flagged.
    LateSuccessOnFailedPayment,
    /// The money arrived after the order stopped being payable. The payment was refunded.
    OrderNotPayable,
}

impl Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReconcileOutcome::Confirmed => "Confirmed",
            ReconcileOutcome::AlreadySettled => "AlreadySettled",
            ReconcileOutcome::PaymentFailed => "PaymentFailed",
            ReconcileOutcome::LateSuccessOnFailedPayment => "LateSuccessOnFailedPayment",
            ReconcileOutcome::OrderNotPayable => "OrderNotPayable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub outcome: ReconcileOutcome,
    /// The payment as it stands after reconciliation
    pub payment: Payment,
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundState>,
}

impl ReconcileResult {
    pub fn new(outcome: ReconcileOutcome, payment: Payment, order: Option<Order>) -> Self {
        Self { outcome, payment, order, refund: None }
    }

    pub fn with_refund(mut self, refund: RefundState) -> Self {
        self.refund = Some(refund);
        self
    }
}

/// A journalled webhook delivery and what reconciling it did.
#[derive(Debug, Clone)]
pub struct WebhookReceipt {
    pub event: GatewayEvent,
    pub result: Result<ReconcileResult, ReconcileError>,
}
