use chrono::{DateTime, Utc};
use mockall::mock;
use order_engine::{
    db_types::{
        CartLine,
        CatalogItem,
        GatewayEvent,
        IdempotencyClaim,
        NewGatewayEvent,
        NewOrder,
        NewPayment,
        NewReviewFlag,
        Order,
        OrderId,
        OrderItem,
        Payment,
        ReviewFlag,
        Sku,
        StockLevel,
        StockMovement,
    },
    traits::{
        AnnulledOrder,
        CatalogError,
        CatalogManagement,
        GatewayError,
        InsertOrderResult,
        IntentRequest,
        OrderManagement,
        OrderStoreError,
        PaymentIntent,
        PaymentManagement,
        PaymentProvider,
        PaymentStoreError,
        ProviderReport,
        RefundReceipt,
        ReviewManagement,
        ReviewStoreError,
        SettleOutcome,
    },
};

mock! {
    pub Backend {}
    impl CatalogManagement for Backend {
        async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<CatalogItem, CatalogError>;
        async fn fetch_catalog_items(&self, skus: &[Sku]) -> Result<Vec<CatalogItem>, CatalogError>;
        async fn fetch_cart(&self, owner_id: &str) -> Result<Vec<CartLine>, CatalogError>;
        async fn set_cart_quantity(&self, owner_id: &str, sku: &Sku, quantity: i64) -> Result<Vec<CartLine>, CatalogError>;
        async fn fetch_stock_levels(&self, skus: &[Sku]) -> Result<Vec<StockLevel>, CatalogError>;
        async fn adjust_stock(&self, sku: &Sku, delta: i64, note: Option<String>) -> Result<StockLevel, CatalogError>;
        async fn fetch_stock_movements(&self, sku: &Sku) -> Result<Vec<StockMovement>, CatalogError>;
    }
    impl OrderManagement for Backend {
        async fn fetch_idempotent_order(&self, scope: &str, key: &str, now: DateTime<Utc>) -> Result<Option<Order>, OrderStoreError>;
        async fn insert_order(&self, order: NewOrder, claim: IdempotencyClaim) -> Result<InsertOrderResult, OrderStoreError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderStoreError>;
        async fn fetch_orders_for_owner(&self, owner_id: &str) -> Result<Vec<Order>, OrderStoreError>;
        async fn cancel_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError>;
        async fn expire_order(&self, order_id: &OrderId) -> Result<AnnulledOrder, OrderStoreError>;
        async fn refund_order(&self, order_id: &OrderId, restock: bool) -> Result<AnnulledOrder, OrderStoreError>;
        async fn mark_order_processing(&self, order_id: &OrderId) -> Result<Order, OrderStoreError>;
        async fn fetch_stale_pending_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError>;
        async fn purge_expired_idempotency_keys(&self, now: DateTime<Utc>) -> Result<u64, OrderStoreError>;
    }
    impl PaymentManagement for Backend {
        async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentStoreError>;
        async fn fetch_payment_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_payments_for_order(&self, order_id: &OrderId) -> Result<Vec<Payment>, PaymentStoreError>;
        async fn fetch_pending_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fetch_settled_payment(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentStoreError>;
        async fn fail_payment(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;
        async fn settle_payment(&self, tx_ref: &str, provider_tx_id: Option<String>) -> Result<SettleOutcome, PaymentStoreError>;
        async fn mark_payment_refunded(&self, tx_ref: &str) -> Result<Option<Payment>, PaymentStoreError>;
    }
    impl ReviewManagement for Backend {
        async fn insert_review_flag(&self, flag: NewReviewFlag) -> Result<ReviewFlag, ReviewStoreError>;
        async fn fetch_unresolved_flags(&self) -> Result<Vec<ReviewFlag>, ReviewStoreError>;
        async fn fetch_flags_for_tx_ref(&self, tx_ref: &str) -> Result<Vec<ReviewFlag>, ReviewStoreError>;
        async fn resolve_review_flag(&self, id: i64) -> Result<ReviewFlag, ReviewStoreError>;
        async fn insert_gateway_event(&self, event: NewGatewayEvent) -> Result<GatewayEvent, ReviewStoreError>;
        async fn set_gateway_event_outcome(&self, id: i64, outcome: &str) -> Result<(), ReviewStoreError>;
        async fn fetch_gateway_events(&self, tx_ref: &str) -> Result<Vec<GatewayEvent>, ReviewStoreError>;
    }
}

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        async fn create_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, GatewayError>;
        async fn verify(&self, tx_ref: &str) -> Result<ProviderReport, GatewayError>;
        async fn refund(&self, payment: &Payment) -> Result<RefundReceipt, GatewayError>;
    }
}
