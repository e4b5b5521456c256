use actix_web::{http::StatusCode, test::TestRequest, web};
use chrono::Utc;
use order_engine::{
    db_types::{ReviewFlag, ReviewReason, Role},
    events::EventProducers,
    traits::ReviewStoreError,
    ReviewApi,
};
use serde_json::Value;

use super::{helpers::{as_caller, send}, mocks::MockBackend};
use crate::routes::{ResolveReviewFlagRoute, ReviewFlagsRoute};

fn flag(id: i64, resolved: bool) -> ReviewFlag {
    ReviewFlag {
        id,
        reason: ReviewReason::AmountMismatch,
        tx_ref: Some("ord-1-0badf00d".into()),
        order_id: Some("ord-1".into()),
        details: "Webhook reported 21.49 NGN but the payment was issued for 21.50 NGN".into(),
        resolved,
        created_at: Utc::now(),
        resolved_at: resolved.then(Utc::now),
    }
}

fn review_api(backend: MockBackend) -> web::Data<ReviewApi<MockBackend>> {
    web::Data::new(ReviewApi::new(backend, EventProducers::default()))
}

#[actix_web::test]
async fn admins_see_the_review_queue() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_unresolved_flags().times(1).returning(|| Ok(vec![flag(1, false), flag(2, false)]));
    let api = review_api(backend);
    let req = as_caller(TestRequest::get().uri("/reviews"), "root", Role::Admin);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(ReviewFlagsRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let flags: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(flags.as_array().map(Vec::len), Some(2));
    assert_eq!(flags[0]["reason"], "AmountMismatch");
}

#[actix_web::test]
async fn vendors_cannot_see_the_review_queue() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_unresolved_flags().never();
    let api = review_api(backend);
    let req = as_caller(TestRequest::get().uri("/reviews"), "vendor-7", Role::Vendor);
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(ReviewFlagsRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn resolve_a_flag() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_resolve_review_flag().withf(|id| *id == 2).times(1).returning(|id| Ok(flag(id, true)));
    let api = review_api(backend);
    let req = as_caller(TestRequest::put().uri("/reviews/2/resolve"), "root", Role::Admin);
    let (status, body) = send(req, |cfg| {
        cfg.app_data(api).service(ResolveReviewFlagRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::OK);
    let flag: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(flag["resolved"], true);
}

#[actix_web::test]
async fn resolving_a_missing_flag() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_resolve_review_flag().returning(|id| Err(ReviewStoreError::FlagNotFound(id)));
    let api = review_api(backend);
    let req = as_caller(TestRequest::put().uri("/reviews/99/resolve"), "root", Role::Admin);
    let (status, _) = send(req, |cfg| {
        cfg.app_data(api).service(ResolveReviewFlagRoute::<MockBackend>::new());
    })
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
