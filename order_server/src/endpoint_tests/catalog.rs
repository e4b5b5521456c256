use actix_web::{http::StatusCode, test::TestRequest, web};
use chrono::Utc;
use order_engine::{
    db_types::{CartLine, CatalogItem, Money, Role, Sku, StockLevel},
    traits::CatalogError,
    CatalogApi,
};
use serde_json::{json, Value};

use super::{helpers::{as_caller, send}, mocks::MockBackend};
use crate::routes::{AdjustStockRoute, MyCartRoute, StockLevelRoute, UpdateCartRoute};

fn catalog_api(backend: MockBackend) -> web::Data<CatalogApi<MockBackend>> {
    web::Data::new(CatalogApi::new(backend))
}

fn shirt() -> CatalogItem {
    CatalogItem::new("shirt-01", Some("xl-red"), "vendor-7", "Red shirt, XL", Money::from(2_000))
}

#[actix_web::test]
async fn carts_belong_to_the_caller() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_cart().withf(|owner| owner == "alice").times(1).returning(|owner| {
        Ok(vec![CartLine { owner_id: owner.to_string(), sku: Sku::from("mug"), quantity: 2, updated_at: Utc::now() }])
    });
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::get().uri("/cart"), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(MyCartRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let cart: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(cart[0]["sku"], "mug");
    assert_eq!(cart[0]["quantity"], 2);
}

#[actix_web::test]
async fn add_a_variant_to_the_cart() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_catalog_items()
        .withf(|skus| skus == [Sku::from("shirt-01/xl-red")])
        .returning(|_| Ok(vec![shirt()]));
    backend
        .expect_set_cart_quantity()
        .withf(|owner, sku, qty| owner == "alice" && sku.as_str() == "shirt-01/xl-red" && *qty == 3)
        .times(1)
        .returning(|owner, sku, quantity| {
            Ok(vec![CartLine { owner_id: owner.to_string(), sku: sku.clone(), quantity, updated_at: Utc::now() }])
        });
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::put().uri("/cart/items"), "alice", Role::Customer)
        .set_json(json!({"product_id": "shirt-01", "variant_id": "xl-red", "quantity": 3}));
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(UpdateCartRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("shirt-01/xl-red"));
}

#[actix_web::test]
async fn unknown_products_cannot_be_added() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_catalog_items().returning(|_| Ok(vec![]));
    backend.expect_set_cart_quantity().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::put().uri("/cart/items"), "alice", Role::Customer)
        .set_json(json!({"product_id": "ghost", "quantity": 1}));
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(UpdateCartRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn negative_cart_quantities_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_set_cart_quantity().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::put().uri("/cart/items"), "alice", Role::Customer)
        .set_json(json!({"product_id": "mug", "quantity": -1}));
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(UpdateCartRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn stock_level_of_a_variant() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_stock_levels().withf(|skus| skus == [Sku::from("shirt-01/xl-red")]).returning(|skus| {
        Ok(vec![StockLevel { sku: skus[0].clone(), available: 4, updated_at: Utc::now() }])
    });
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::get().uri("/stock/shirt-01/xl-red"), "vendor-7", Role::Vendor);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(StockLevelRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let level: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(level["available"], 4);
}

#[actix_web::test]
async fn customers_cannot_see_stock() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_stock_levels().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::get().uri("/stock/mug"), "alice", Role::Customer);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(StockLevelRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("vendor"), "{body}");
}

#[actix_web::test]
async fn only_admins_adjust_stock() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_adjust_stock().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::post().uri("/stock/mug/adjust"), "vendor-7", Role::Vendor)
        .set_json(json!({"delta": 5}));
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(AdjustStockRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn zero_adjustments_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_adjust_stock().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::post().uri("/stock/mug/adjust"), "root", Role::Admin)
        .set_json(json!({"delta": 0, "note": "recount"}));
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(AdjustStockRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn stock_cannot_go_negative() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_catalog_items().returning(|_| Ok(vec![shirt()]));
    backend.expect_adjust_stock().times(1).returning(|sku, delta, _| {
        Err(CatalogError::NegativeStock { sku: sku.clone(), available: 2, delta })
    });
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::post().uri("/stock/shirt-01/xl-red/adjust"), "root", Role::Admin)
        .set_json(json!({"delta": -5, "note": "damaged in transit"}));
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(AdjustStockRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot go below zero"), "{body}");
}

#[actix_web::test]
async fn malformed_skus_are_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_stock_levels().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::get().uri("/stock/shirt-01/xl/red"), "root", Role::Admin);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(StockLevelRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid SKU"), "{body}");

    let mut backend = MockBackend::new();
    backend.expect_fetch_catalog_items().never();
    backend.expect_set_cart_quantity().never();
    let api = catalog_api(backend);
    let req = as_caller(TestRequest::put().uri("/cart/items"), "alice", Role::Customer)
        .set_json(json!({"product_id": "red shirt!", "quantity": 1}));
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(UpdateCartRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid SKU"), "{body}");
}
