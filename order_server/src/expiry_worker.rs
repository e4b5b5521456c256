use chrono::Duration;
use log::*;
use order_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::integrations::HttpPaymentProvider;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, `Pending` orders older than `unpaid_expiry` are cancelled and their stock restored. Expired
/// idempotency keys are dropped on the same tick.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    provider: HttpPaymentProvider,
    producers: EventProducers,
    unpaid_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(60));
        let api = OrderFlowApi::new(db, provider, producers);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_unpaid_orders(unpaid_expiry).await {
                Ok(result) if result.expired.is_empty() && result.purged_keys == 0 => {
                    trace!("🕰️ Nothing to expire");
                },
                Ok(result) => {
                    info!("🕰️ {} unpaid orders expired", result.expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&result.expired));
                    debug!("🕰️ {} idempotency keys purged", result.purged_keys);
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} owner: {}", o.id, o.order_id, o.owner_id))
        .collect::<Vec<String>>()
        .join(", ")
}
