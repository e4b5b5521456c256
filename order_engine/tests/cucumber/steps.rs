use chrono::Duration;
use cucumber::{given, then, when};
use order_engine::{
    db_types::{Money, OrderStatusType, PaymentStatus},
    traits::{InsertOrderResult, OrderManagement, PaymentManagement, ReviewManagement},
    AccessScope,
    PricingPolicy,
    ReportSource,
};

use crate::{
    cucumber::MarketWorld,
    support::{details, report, TestSystem},
};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketWorld) {
    world.system = Some(TestSystem::new().await);
}

#[given(expr = "a fresh marketplace charging {int} basis points of tax")]
async fn fresh_marketplace_with_tax(world: &mut MarketWorld, bps: u32) {
    let pricing = PricingPolicy::default().with_tax_rate_bps(bps);
    world.system = Some(TestSystem::with_setup(pricing, Default::default()).await);
}

#[given(expr = "the catalog lists '{word}' at {int} with {int} in stock")]
async fn list_product(world: &mut MarketWorld, product: String, price: i64, stock: i64) {
    let sku = world.system().seed(&product, price, stock).await;
    world.skus.insert(product, sku);
}

#[when(expr = "'{word}' adds {int} '{word}' to the cart")]
async fn add_to_cart(world: &mut MarketWorld, customer: String, quantity: i64, product: String) {
    let sku = world.sku(&product);
    world.system().add_to_cart(&customer, &sku, quantity).await;
}

#[when(expr = "'{word}' checks out with key '{word}'")]
async fn check_out(world: &mut MarketWorld, customer: String, key: String) {
    let result = world.system().checkout.checkout(&customer, details(), &key).await;
    match result {
        Ok(result) => {
            world.orders.insert(customer, InsertOrderResult::into_order(result));
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(format!("{e:?}")),
    }
}

#[then(expr = "the checkout fails with {word}")]
async fn checkout_fails(world: &mut MarketWorld, variant: String) {
    let err = world.last_error.as_deref().expect("The last checkout succeeded");
    assert!(err.starts_with(&variant), "Expected {variant}, got {err}");
}

#[when(expr = "'{word}' starts paying")]
async fn start_paying(world: &mut MarketWorld, customer: String) {
    let order = world.order(&customer).clone();
    let payment = world.system().pay_intent(&order).await;
    world.payments.insert(customer, payment);
}

#[when(expr = "the gateway reports {word} for {int} on the payment of '{word}'")]
async fn gateway_reports(world: &mut MarketWorld, status: String, amount: i64, customer: String) {
    let payment = world.payment(&customer).clone();
    let report = report(&payment, &status, Money::from(amount));
    match world.system().reconciler.reconcile(ReportSource::Webhook, report).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(format!("{e:?}")),
    }
}

#[when(expr = "'{word}' cancels the order")]
async fn cancel_order(world: &mut MarketWorld, customer: String) {
    let order_id = world.order(&customer).order_id.clone();
    let scope = AccessScope::Owner(customer);
    match world.system().orders.cancel_order(&order_id, None, &scope).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(format!("{e:?}")),
    }
}

#[when("unpaid orders are expired")]
async fn expire_orders(world: &mut MarketWorld) {
    world.system().orders.expire_unpaid_orders(Duration::seconds(-1)).await.expect("Error expiring orders");
}

#[then(expr = "the order of '{word}' is {word} with a total of {int}")]
async fn order_status(world: &mut MarketWorld, customer: String, status: String, total: i64) {
    let order_id = world.order(&customer).order_id.clone();
    let order = world
        .system()
        .db
        .fetch_order_by_order_id(&order_id)
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    let expected = status.parse::<OrderStatusType>().expect("Not an order status");
    assert_eq!(order.status, expected, "Status is incorrect");
    assert_eq!(order.total, Money::from(total), "Total is incorrect");
}

#[then(expr = "'{word}' has no orders")]
async fn no_orders(world: &mut MarketWorld, customer: String) {
    let orders = world.system().db.fetch_orders_for_owner(&customer).await.expect("Error fetching orders");
    assert!(orders.is_empty(), "{customer} has {} orders", orders.len());
}

#[then(expr = "the payment of '{word}' is {word}")]
async fn payment_status(world: &mut MarketWorld, customer: String, status: String) {
    let tx_ref = world.payment(&customer).tx_ref.clone();
    let payment = world
        .system()
        .db
        .fetch_payment_by_tx_ref(&tx_ref)
        .await
        .expect("Error fetching payment")
        .expect("Payment does not exist");
    let expected = status.parse::<PaymentStatus>().expect("Not a payment status");
    assert_eq!(payment.status, expected, "Payment status is incorrect");
}

#[then(expr = "the stock of '{word}' is {int}")]
async fn stock_level(world: &mut MarketWorld, product: String, expected: i64) {
    let sku = world.sku(&product);
    assert_eq!(world.system().stock(&sku).await, expected, "Stock level is incorrect");
}

#[then(expr = "there is/are {int} unresolved review flag(s)")]
async fn unresolved_flags(world: &mut MarketWorld, count: usize) {
    let flags = world.system().db.fetch_unresolved_flags().await.expect("Error fetching flags");
    assert_eq!(flags.len(), count, "Unexpected review flags: {flags:?}");
}

#[then(expr = "the last request failed with {word}")]
async fn last_request_failed(world: &mut MarketWorld, variant: String) {
    let err = world.last_error.as_deref().expect("The last request succeeded");
    assert!(err.starts_with(&variant), "Expected {variant}, got {err}");
}
