use rand::Rng;

use crate::db_types::OrderId;

/// Generates a fresh transaction reference for a payment attempt on `order_id`, e.g. `ORD-20240907-5f3a9c1e-8c0ffee1`.
pub fn new_tx_ref(order_id: &OrderId) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{order_id}-{suffix:08x}")
}
