use actix_web::{http::StatusCode, test::TestRequest, web};
use chrono::Utc;
use order_engine::{
    db_types::{CartLine, CatalogItem, Money, OrderId, OrderItem, OrderStatusType, PaymentStatus, Role, Sku, StockLevel},
    events::EventProducers,
    traits::{AnnulledOrder, InsertOrderResult, OrderStoreError},
    CheckoutApi,
    OrderFlowApi,
    PaymentApi,
    PricingPolicy,
};
use serde_json::{json, Value};

use super::{
    helpers::{as_caller, order, payment, send},
    mocks::{MockBackend, MockProvider},
};
use crate::routes::{CancelOrderRoute, CreateOrderRoute, OrderByIdRoute, ProcessOrderRoute, StartPaymentRoute};

fn checkout_api(backend: MockBackend) -> web::Data<CheckoutApi<MockBackend>> {
    let pricing = PricingPolicy::new("NGN").with_tax_rate_bps(750);
    web::Data::new(CheckoutApi::new(backend, pricing, EventProducers::default()))
}

fn order_flow_api(backend: MockBackend) -> web::Data<OrderFlowApi<MockBackend, MockProvider>> {
    web::Data::new(OrderFlowApi::new(backend, MockProvider::new(), EventProducers::default()))
}

fn create_order_request() -> TestRequest {
    TestRequest::post().uri("/orders").set_json(json!({
        "idempotency_key": "checkout-0001",
        "shipping_address": "12 Marina Road, Lagos",
        "payment_method": "card"
    }))
}

/// A backend with one lantern in alice's cart and `stock` lanterns on the shelf.
fn backend_with_cart(stock: i64) -> MockBackend {
    let sku = Sku::new("lantern", None);
    let mut backend = MockBackend::new();
    backend.expect_fetch_idempotent_order().returning(|_, _, _| Ok(None));
    let cart_sku = sku.clone();
    backend.expect_fetch_cart().returning(move |owner| {
        Ok(vec![CartLine { owner_id: owner.to_string(), sku: cart_sku.clone(), quantity: 1, updated_at: Utc::now() }])
    });
    backend
        .expect_fetch_catalog_items()
        .returning(|_| Ok(vec![CatalogItem::new("lantern", None, "vendor-1", "Lantern", Money::from(2_000))]));
    let stock_sku = sku.clone();
    backend
        .expect_fetch_stock_levels()
        .returning(move |_| Ok(vec![StockLevel { sku: stock_sku.clone(), available: stock, updated_at: Utc::now() }]));
    backend
}

#[actix_web::test]
async fn create_order_needs_an_identity() {
    let _ = env_logger::try_init().ok();
    let api = checkout_api(MockBackend::new());
    let (status, body) = send(create_order_request(), |cfg| {
        cfg.app_data(api).service(CreateOrderRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No caller identity"), "{body}");
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let mut backend = backend_with_cart(5);
    backend
        .expect_insert_order()
        .withf(|o, claim| o.owner_id == "alice" && o.total == Money::from(2_150) && claim.key == "checkout-0001")
        .times(1)
        .returning(|_, _| Ok(InsertOrderResult::Inserted(order("ord-1", "alice", OrderStatusType::Pending))));
    backend.expect_fetch_order_items().returning(|_| Ok(vec![]));
    let api = checkout_api(backend);
    let req = as_caller(create_order_request(), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CreateOrderRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["order_id"], "ord-1");
    assert_eq!(order["status"], "Pending");
}

#[actix_web::test]
async fn replayed_order_returns_200() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_idempotent_order()
        .withf(|scope, key, _| scope.ends_with("alice") && key == "checkout-0001")
        .returning(|_, _, _| Ok(Some(order("ord-1", "alice", OrderStatusType::Pending))));
    backend.expect_insert_order().never();
    let api = checkout_api(backend);
    let req = as_caller(create_order_request(), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CreateOrderRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""order_id":"ord-1""#), "{body}");
}

#[actix_web::test]
async fn sold_out_while_checking_out() {
    let _ = env_logger::try_init().ok();
    let mut backend = backend_with_cart(1);
    backend
        .expect_insert_order()
        .returning(|_, _| Err(OrderStoreError::InsufficientStock(Sku::new("lantern", None))));
    let api = checkout_api(backend);
    let req = as_caller(create_order_request(), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CreateOrderRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("not enough stock of lantern"), "{body}");
}

#[actix_web::test]
async fn empty_cart_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_idempotent_order().returning(|_, _, _| Ok(None));
    backend.expect_fetch_cart().returning(|_| Ok(vec![]));
    let api = checkout_api(backend);
    let req = as_caller(create_order_request(), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CreateOrderRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The cart is empty"}"#);
}

#[actix_web::test]
async fn other_peoples_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(order(id.as_str(), "alice", OrderStatusType::Pending))));
    backend.expect_fetch_order_items().returning(|_| Ok(vec![]));
    let api = order_flow_api(backend);
    let req = as_caller(TestRequest::get().uri("/orders/ord-1"), "bob", Role::Customer);
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api.clone()).service(OrderByIdRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = as_caller(TestRequest::get().uri("/orders/ord-1"), "root", Role::Admin);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(OrderByIdRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let detail: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(detail["owner_id"], "alice");
    assert_eq!(detail["items"], json!([]));
}

#[actix_web::test]
async fn cancel_order_with_a_reason() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(order(id.as_str(), "alice", OrderStatusType::Pending))));
    backend.expect_cancel_order().times(1).returning(|id| {
        Ok(AnnulledOrder {
            order: order(id.as_str(), "alice", OrderStatusType::Cancelled),
            previous_status: OrderStatusType::Pending,
            restored: vec![],
        })
    });
    let api = order_flow_api(backend);
    let req = TestRequest::put().uri("/orders/ord-1/cancel").set_json(json!({ "reason": "changed my mind" }));
    let req = as_caller(req, "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CancelOrderRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["status"], "Cancelled");
}

#[actix_web::test]
async fn processing_orders_cannot_be_cancelled() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(order(id.as_str(), "alice", OrderStatusType::Processing))));
    backend.expect_cancel_order().never();
    let api = order_flow_api(backend);
    // No body at all is fine too
    let req = as_caller(TestRequest::put().uri("/orders/ord-1/cancel"), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(CancelOrderRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("can no longer be cancelled"), "{body}");
}

#[actix_web::test]
async fn customers_cannot_process_orders() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_mark_order_processing().never();
    let api = order_flow_api(backend);
    let req = as_caller(TestRequest::put().uri("/orders/ord-1/process"), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(ProcessOrderRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("requires the vendor or admin role"), "{body}");
}

#[actix_web::test]
async fn vendors_process_orders_for_their_items() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(order(id.as_str(), "alice", OrderStatusType::Confirmed))));
    backend.expect_fetch_order_items().returning(|id| {
        Ok(vec![OrderItem {
            id: 1,
            order_id: id.clone(),
            product_id: "lantern".into(),
            variant_id: None,
            sku: Sku::new("lantern", None),
            vendor_id: "vendor-1".into(),
            title: "Lantern".into(),
            quantity: 1,
            unit_price: Money::from(2_000),
            line_total: Money::from(2_000),
        }])
    });
    backend
        .expect_mark_order_processing()
        .times(1)
        .returning(|id| Ok(order(id.as_str(), "alice", OrderStatusType::Processing)));
    let api = order_flow_api(backend);
    let req = as_caller(TestRequest::put().uri("/orders/ord-1/process"), "vendor-1", Role::Vendor);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(ProcessOrderRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Processing""#), "{body}");
}

#[actix_web::test]
async fn start_payment() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_order_by_order_id()
        .returning(|id| Ok(Some(order(id.as_str(), "alice", OrderStatusType::Pending))));
    backend.expect_fetch_pending_payment().returning(|_| Ok(None));
    backend.expect_insert_payment().times(1).returning(|p| {
        let o = order(p.order_id.as_str(), "alice", OrderStatusType::Pending);
        let mut issued = payment(&o, &p.tx_ref, PaymentStatus::Pending);
        issued.payment_link = p.payment_link;
        Ok(issued)
    });
    let mut provider = MockProvider::new();
    provider
        .expect_create_intent()
        .withf(|r| r.order_id == OrderId::from("ord-1") && r.amount == Money::from(2_150) && r.owner_id == "alice")
        .times(1)
        .returning(|r| {
            Ok(order_engine::traits::PaymentIntent {
                payment_link: "https://checkout.example.com/pay/abc".into(),
                tx_ref: r.tx_ref.clone(),
            })
        });
    let api = web::Data::new(PaymentApi::new(backend, provider));
    let req = as_caller(TestRequest::post().uri("/orders/ord-1/payment"), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(StartPaymentRoute::<MockBackend, MockProvider>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let link: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(link["payment_link"], "https://checkout.example.com/pay/abc");
    assert!(link["tx_ref"].as_str().unwrap().starts_with("ord-1-"));
}
