use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{GatewayEvent, NewGatewayEvent, NewReviewFlag, Payment, PaymentStatus, ReviewReason},
    events::{EventProducers, OrderConfirmedEvent},
    oe_api::{
        access::{fetch_order_in_scope, AccessScope},
        errors::ReconcileError,
        reconciliation_objects::{ReconcileOutcome, ReconcileResult, ReportSource, WebhookReceipt},
        refunds::refund_payment,
        review_api::raise_flag,
    },
    traits::{OrderManagement, PaymentManagement, PaymentProvider, ProviderReport, ReviewManagement, SettleOutcome},
};

/// The single place where provider reports change payment and order state.
///
/// Webhook pushes and client verification pulls arrive at-least-once and in any order. Every transition is a
/// compare-and-swap, so any interleaving of reports for one payment confirms the order at most once.
pub struct ReconciliationApi<B, P> {
    db: B,
    provider: P,
    producers: EventProducers,
}

impl<B, P> Debug for ReconciliationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, P> ReconciliationApi<B, P> {
    pub fn new(db: B, provider: P, producers: EventProducers) -> Self {
        Self { db, provider, producers }
    }
}

impl<B, P> ReconciliationApi<B, P>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    pub async fn reconcile(
        &self,
        source: ReportSource,
        report: ProviderReport,
    ) -> Result<ReconcileResult, ReconcileError> {
        let tx_ref = report.tx_ref.clone();
        trace!("🔁 Reconciling [{tx_ref}] from {source}: {} {} {}", report.status, report.amount, report.currency);
        let Some(payment) = self.db.fetch_payment_by_tx_ref(&tx_ref).await? else {
            warn!("🔁 {source} reported on [{tx_ref}], which was never issued");
            let details = format!("{source} reported {} for {} {}", report.status, report.amount, report.currency);
            let flag = NewReviewFlag::new(ReviewReason::UnknownTransaction, details).with_tx_ref(&tx_ref);
            raise_flag(&self.db, &self.producers, flag).await?;
            return Err(ReconcileError::UnknownTransaction(tx_ref));
        };
        match payment.status {
            PaymentStatus::Completed | PaymentStatus::Refunded => {
                debug!("🔁 [{tx_ref}] is already {}. Nothing to do", payment.status);
                return self.current_state(ReconcileOutcome::AlreadySettled, payment).await;
            },
            PaymentStatus::Failed if report.is_successful() => {
                warn!("🔁 {source} reported success for [{tx_ref}], which has already failed");
                let details = format!("{source} reported success for {} {} after the payment failed", report.amount, report.currency);
                let flag = NewReviewFlag::new(ReviewReason::LateSuccessOnFailedPayment, details)
                    .with_tx_ref(&tx_ref)
                    .with_order_id(&payment.order_id);
                raise_flag(&self.db, &self.producers, flag).await?;
                return self.current_state(ReconcileOutcome::LateSuccessOnFailedPayment, payment).await;
            },
            PaymentStatus::Failed => {
                return self.current_state(ReconcileOutcome::PaymentFailed, payment).await;
            },
            PaymentStatus::Pending => {},
        }
        if !report.is_successful() {
            info!("🔁 {source} reported [{tx_ref}] as '{}'. Marking the payment as failed", report.status);
            return match self.db.fail_payment(&tx_ref).await? {
                Some(failed) => self.current_state(ReconcileOutcome::PaymentFailed, failed).await,
                None => self.after_lost_race(&tx_ref).await,
            };
        }
        if !report.matches(&payment) {
            warn!(
                "🔁 {source} reported {} {} for [{tx_ref}], but {} {} was expected",
                report.amount, report.currency, payment.amount, payment.currency
            );
            let reported = format!(
                "{source} reported {} {} but the payment was issued for {} {}",
                report.amount, report.currency, payment.amount, payment.currency
            );
            let details = match self.db.fail_payment(&tx_ref).await? {
                Some(_) => format!("{reported}. The payment was marked as failed"),
                None => {
                    let status = self.db.fetch_payment_by_tx_ref(&tx_ref).await?.map(|p| p.status);
                    let status = status.map(|s| s.to_string()).unwrap_or_else(|| "missing".to_string());
                    warn!("🔁 [{tx_ref}] moved to {status} before it could be failed. Leaving it as it is");
                    format!("{reported}. The payment was already {status} and was left unchanged")
                },
            };
            let flag = NewReviewFlag::new(ReviewReason::AmountMismatch, details)
                .with_tx_ref(&tx_ref)
                .with_order_id(&payment.order_id);
            raise_flag(&self.db, &self.producers, flag).await?;
            return Err(ReconcileError::AmountMismatch {
                tx_ref,
                expected: payment.amount,
                expected_currency: payment.currency,
                reported: report.amount,
                reported_currency: report.currency,
            });
        }
        match self.db.settle_payment(&tx_ref, report.provider_tx_id).await? {
            SettleOutcome::Settled { payment, order } => {
                info!("🔁 [{tx_ref}] settled via {source}. Order {} is confirmed", order.order_id);
                let event = OrderConfirmedEvent::new(order.clone(), payment.clone());
                self.producers.publish_order_confirmed(event).await;
                Ok(ReconcileResult::new(ReconcileOutcome::Confirmed, payment, Some(order)))
            },
            SettleOutcome::OrderNotPayable { payment, order } => {
                warn!("🔁 [{tx_ref}] was paid, but order {} is {}. Refunding", order.order_id, order.status);
                let details = format!("Payment of {} {} arrived while the order was {}", payment.amount, payment.currency, order.status);
                let flag = NewReviewFlag::new(ReviewReason::OrderNotPayable, details)
                    .with_tx_ref(&tx_ref)
                    .with_order_id(&order.order_id);
                raise_flag(&self.db, &self.producers, flag).await?;
                let refund = refund_payment(&self.db, &self.provider, &self.producers, payment).await;
                let payment = self.db.fetch_payment_by_tx_ref(&tx_ref).await?.ok_or_else(|| {
                    ReconcileError::DatabaseError(format!("Payment [{tx_ref}] disappeared during reconciliation"))
                })?;
                Ok(ReconcileResult::new(ReconcileOutcome::OrderNotPayable, payment, Some(order)).with_refund(refund))
            },
            SettleOutcome::Stale(_) => self.after_lost_race(&tx_ref).await,
        }
    }

    /// Asks the provider about `tx_ref` and reconciles the answer.
    ///
    /// The transaction must belong to an order in the caller's scope. The provider is not called for references we never
    /// issued.
    pub async fn verify_payment(&self, tx_ref: &str, scope: &AccessScope) -> Result<ReconcileResult, ReconcileError> {
        let payment = self
            .db
            .fetch_payment_by_tx_ref(tx_ref)
            .await?
            .ok_or_else(|| ReconcileError::UnknownTransaction(tx_ref.to_string()))?;
        if fetch_order_in_scope(&self.db, &payment.order_id, scope).await?.is_none() {
            return Err(ReconcileError::UnknownTransaction(tx_ref.to_string()));
        }
        if payment.status.is_settled() {
            return self.current_state(ReconcileOutcome::AlreadySettled, payment).await;
        }
        let report = self.provider.verify(tx_ref).await?;
        if report.tx_ref != tx_ref {
            return Err(ReconcileError::DatabaseError(format!(
                "The provider answered for [{}] when asked about [{tx_ref}]",
                report.tx_ref
            )));
        }
        self.reconcile(ReportSource::ClientVerify, report).await
    }

    /// Journals a signature-verified webhook delivery, reconciles it, and records the outcome against the delivery.
    ///
    /// The delivery is stored before anything else happens. Only a failure to store it is returned as an error; the
    /// reconciliation result, good or bad, is part of the receipt.
    pub async fn process_webhook(
        &self,
        delivery: NewGatewayEvent,
        report: ProviderReport,
    ) -> Result<WebhookReceipt, ReconcileError> {
        let event = self.db.insert_gateway_event(delivery).await?;
        let result = self.reconcile(ReportSource::Webhook, report).await;
        let outcome = match &result {
            Ok(r) => r.outcome.to_string(),
            Err(e) => e.to_string(),
        };
        if let Err(e) = self.db.set_gateway_event_outcome(event.id, &outcome).await {
            error!("🔁 Could not record the outcome of webhook #{}. {e}", event.id);
        }
        Ok(WebhookReceipt { event, result })
    }

    async fn current_state(
        &self,
        outcome: ReconcileOutcome,
        payment: Payment,
    ) -> Result<ReconcileResult, ReconcileError> {
        let order = self.db.fetch_order_by_order_id(&payment.order_id).await?;
        Ok(ReconcileResult::new(outcome, payment, order))
    }

    /// A compare-and-swap found the payment already moved on. Reports what the winner left behind.
    async fn after_lost_race(&self, tx_ref: &str) -> Result<ReconcileResult, ReconcileError> {
        let payment = self
            .db
            .fetch_payment_by_tx_ref(tx_ref)
            .await?
            .ok_or_else(|| ReconcileError::UnknownTransaction(tx_ref.to_string()))?;
        debug!("🔁 Another report for [{tx_ref}] got there first. It is now {}", payment.status);
        let outcome = match payment.status {
            PaymentStatus::Failed => ReconcileOutcome::PaymentFailed,
            _ => ReconcileOutcome::AlreadySettled,
        };
        self.current_state(outcome, payment).await
    }
}
