use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{GatewayEvent, NewReviewFlag, ReviewFlag, ReviewReason},
    events::{EventProducers, ReviewFlaggedEvent, SignatureRejectedEvent},
    traits::{ReviewManagement, ReviewStoreError},
};

/// The manual review queue.
pub struct ReviewApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReviewApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReviewApi")
    }
}

impl<B> ReviewApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReviewApi<B>
where B: ReviewManagement
{
    pub async fn unresolved_flags(&self) -> Result<Vec<ReviewFlag>, ReviewStoreError> {
        self.db.fetch_unresolved_flags().await
    }

    pub async fn flags_for_tx_ref(&self, tx_ref: &str) -> Result<Vec<ReviewFlag>, ReviewStoreError> {
        self.db.fetch_flags_for_tx_ref(tx_ref).await
    }

    pub async fn gateway_events(&self, tx_ref: &str) -> Result<Vec<GatewayEvent>, ReviewStoreError> {
        self.db.fetch_gateway_events(tx_ref).await
    }

    pub async fn resolve(&self, id: i64) -> Result<ReviewFlag, ReviewStoreError> {
        let flag = self.db.resolve_review_flag(id).await?;
        info!("🗃️ Review flag #{id} ({}) resolved", flag.reason);
        Ok(flag)
    }

    pub async fn raise(&self, flag: NewReviewFlag) -> Result<ReviewFlag, ReviewStoreError> {
        raise_flag(&self.db, &self.producers, flag).await
    }

    /// Records a webhook delivery whose signature did not verify.
    pub async fn record_signature_rejection(&self, event: SignatureRejectedEvent) -> Result<ReviewFlag, ReviewStoreError> {
        let ip = event.remote_ip.as_deref().unwrap_or("unknown address");
        let details = format!("Webhook from {ip} rejected. {}", event.details);
        self.raise(NewReviewFlag::new(ReviewReason::InvalidSignature, details)).await
    }
}

pub(crate) async fn raise_flag<B: ReviewManagement>(
    db: &B,
    producers: &EventProducers,
    flag: NewReviewFlag,
) -> Result<ReviewFlag, ReviewStoreError> {
    let flag = db.insert_review_flag(flag).await?;
    producers.publish_review_flagged(ReviewFlaggedEvent { flag: flag.clone() }).await;
    Ok(flag)
}
