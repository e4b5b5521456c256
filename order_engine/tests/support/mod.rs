#![allow(dead_code)]

use log::*;
use order_engine::{
    db_types::{Money, Order, Payment, Sku},
    events::EventProducers,
    test_utils::{
        prepare_env::{drop_database, prepare_test_env, random_db_path, seed_item},
        FakePaymentProvider,
    },
    traits::{CatalogManagement, InsertOrderResult, ProviderReport},
    AccessScope,
    CatalogApi,
    CheckoutApi,
    CheckoutDetails,
    OrderFlowApi,
    PaymentApi,
    PricingPolicy,
    ReconciliationApi,
    ReviewApi,
    SqliteDatabase,
};

/// A complete engine over a throw-away database and a fake payment provider.
pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub provider: FakePaymentProvider,
    pub checkout: CheckoutApi<SqliteDatabase>,
    pub catalog: CatalogApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, FakePaymentProvider>,
    pub reconciler: ReconciliationApi<SqliteDatabase, FakePaymentProvider>,
    pub orders: OrderFlowApi<SqliteDatabase, FakePaymentProvider>,
    pub reviews: ReviewApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_setup(PricingPolicy::default(), EventProducers::default()).await
    }

    pub async fn with_setup(pricing: PricingPolicy, producers: EventProducers) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let provider = FakePaymentProvider::new();
        Self {
            checkout: CheckoutApi::new(db.clone(), pricing, producers.clone()),
            catalog: CatalogApi::new(db.clone()),
            payments: PaymentApi::new(db.clone(), provider.clone()),
            reconciler: ReconciliationApi::new(db.clone(), provider.clone(), producers.clone()),
            orders: OrderFlowApi::new(db.clone(), provider.clone(), producers.clone()),
            reviews: ReviewApi::new(db.clone(), producers),
            url,
            db,
            provider,
        }
    }

    pub async fn seed(&self, product_id: &str, price: i64, stock: i64) -> Sku {
        seed_item(&self.db, product_id, "vendor-1", price, stock).await
    }

    pub async fn stock(&self, sku: &Sku) -> i64 {
        self.db
            .fetch_stock_levels(std::slice::from_ref(sku))
            .await
            .expect("Error fetching stock")
            .pop()
            .map(|l| l.available)
            .unwrap_or_default()
    }

    pub async fn add_to_cart(&self, owner_id: &str, sku: &Sku, quantity: i64) {
        self.catalog.set_cart_quantity(owner_id, sku, quantity).await.expect("Error updating cart");
    }

    /// Puts `quantity` of `sku` in the owner's cart and checks out.
    pub async fn place_order(&self, owner_id: &str, sku: &Sku, quantity: i64) -> Order {
        self.add_to_cart(owner_id, sku, quantity).await;
        let key = format!("checkout-{}", rand::random::<u64>());
        self.checkout
            .checkout(owner_id, details(), &key)
            .await
            .map(InsertOrderResult::into_order)
            .expect("Error checking out")
    }

    pub async fn pay_intent(&self, order: &Order) -> Payment {
        self.payments
            .create_intent(&order.order_id, &AccessScope::Owner(order.owner_id.clone()))
            .await
            .expect("Error creating payment intent")
    }

    pub async fn tear_down(self) {
        self.db.close().await;
        drop_database(&self.url).await;
        debug!("🚀️ Removed test database {}", self.url);
    }
}

pub fn details() -> CheckoutDetails {
    CheckoutDetails::new("12 Marina Road, Lagos", "card")
}

pub fn report(payment: &Payment, status: &str, amount: Money) -> ProviderReport {
    ProviderReport {
        tx_ref: payment.tx_ref.clone(),
        status: status.to_string(),
        amount,
        currency: payment.currency.clone(),
        provider_tx_id: Some(format!("flw-{}", payment.tx_ref)),
    }
}

pub fn success(payment: &Payment) -> ProviderReport {
    report(payment, "successful", payment.amount)
}
