use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewReviewFlag, Payment, PaymentStatus, ReviewReason},
    events::EventProducers,
    oe_api::review_api::raise_flag,
    traits::{PaymentManagement, PaymentProvider, ReviewManagement},
};

/// Whether the money for an annulled order went back to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundState {
    /// No money had been taken for the order
    NotRequired,
    Refunded(Payment),
    /// The refund did not go through. A `RefundFailed` review flag was raised.
    Flagged { tx_ref: String, reason: String },
}

/// Returns the money for a `Completed` payment through the provider, then marks it `Refunded`.
///
/// The order has already reached its terminal state by the time this is called. Failures are never swallowed: they
/// raise a review flag and are reported as [`RefundState::Flagged`].
pub(crate) async fn refund_payment<B, P>(
    db: &B,
    provider: &P,
    producers: &EventProducers,
    payment: Payment,
) -> RefundState
where
    B: PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let tx_ref = payment.tx_ref.clone();
    if payment.status != PaymentStatus::Completed {
        warn!("💳 Payment [{tx_ref}] is {}. Only completed payments can be refunded", payment.status);
        return flag(db, producers, &payment, format!("Payment is {}, not Completed", payment.status)).await;
    }
    let receipt = match provider.refund(&payment).await {
        Ok(r) => r,
        Err(e) => {
            error!("💳 Refund of payment [{tx_ref}] failed. {e}");
            return flag(db, producers, &payment, e.to_string()).await;
        },
    };
    info!("💳 Refund {} issued for payment [{tx_ref}] ({})", receipt.refund_id, receipt.status);
    match db.mark_payment_refunded(&tx_ref).await {
        Ok(Some(refunded)) => RefundState::Refunded(refunded),
        Ok(None) => {
            let reason = format!("Refund {} was issued but the payment was no longer Completed", receipt.refund_id);
            flag(db, producers, &payment, reason).await
        },
        Err(e) => {
            let reason = format!("Refund {} was issued but could not be recorded. {e}", receipt.refund_id);
            flag(db, producers, &payment, reason).await
        },
    }
}

async fn flag<B: ReviewManagement>(
    db: &B,
    producers: &EventProducers,
    payment: &Payment,
    reason: String,
) -> RefundState {
    let details = format!("Refund of {} {} for order {} failed. {reason}", payment.amount, payment.currency, payment.order_id);
    let new_flag = NewReviewFlag::new(ReviewReason::RefundFailed, details)
        .with_tx_ref(&payment.tx_ref)
        .with_order_id(&payment.order_id);
    if let Err(e) = raise_flag(db, producers, new_flag).await {
        error!("💳 Could not raise a review flag for the failed refund of [{}]. {e}", payment.tx_ref);
    }
    RefundState::Flagged { tx_ref: payment.tx_ref.clone(), reason }
}
