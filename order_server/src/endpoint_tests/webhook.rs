use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use actix_web::{http::StatusCode, test::TestRequest, web};
use chrono::Utc;
use market_common::Secret;
use order_engine::{
    db_types::{GatewayEvent, Money, OrderStatusType, PaymentStatus, ReviewFlag, ReviewReason},
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{ReviewStoreError, SettleOutcome},
    ReconciliationApi,
};
use serde_json::Value;

use super::{
    helpers::{order, payment, send},
    mocks::{MockBackend, MockProvider},
};
use crate::{helpers::calculate_hmac, middleware::HmacMiddlewareFactory, routes::GatewayWebhookRoute};

const SECRET: &str = "whsec_test_only";
const HEADER: &str = "X-Gateway-Signature";

fn body(tx_ref: &str, status: &str, amount: &str) -> String {
    format!(
        r#"{{"event":"charge.completed","data":{{"id":4411021,"tx_ref":"{tx_ref}","status":"{status}","amount":{amount},"currency":"NGN"}}}}"#
    )
}

fn signed(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((HEADER, calculate_hmac(SECRET, body.as_bytes())))
        .set_payload(body.to_string())
}

fn journalled(backend: &mut MockBackend) {
    backend.expect_insert_gateway_event().times(1).returning(|e| {
        Ok(GatewayEvent {
            id: 7,
            event: e.event,
            tx_ref: e.tx_ref,
            status: e.status,
            amount: e.amount,
            currency: e.currency,
            payload: e.payload,
            outcome: None,
            received_at: Utc::now(),
        })
    });
}

fn flag(reason: ReviewReason) -> ReviewFlag {
    ReviewFlag {
        id: 3,
        reason,
        tx_ref: None,
        order_id: None,
        details: String::new(),
        resolved: false,
        created_at: Utc::now(),
        resolved_at: None,
    }
}

async fn deliver(req: TestRequest, backend: MockBackend, producers: EventProducers) -> (StatusCode, String) {
    let api = web::Data::new(ReconciliationApi::new(backend, MockProvider::new(), producers.clone()));
    let hmac = HmacMiddlewareFactory::new(HEADER, Secret::new(SECRET.to_string()), true, producers, false, false);
    send(req, move |cfg| {
        cfg.app_data(api).service(
            web::scope("/gateway").service(GatewayWebhookRoute::<MockBackend, MockProvider>::new()).wrap(hmac),
        );
    })
    .await
}

#[actix_web::test]
async fn successful_payment_confirms_the_order() {
    let _ = env_logger::try_init().ok();
    let pending = order("ord-1", "alice", OrderStatusType::Pending);
    let tx_ref = "ord-1-0badf00d";
    let mut backend = MockBackend::new();
    journalled(&mut backend);
    let p = payment(&pending, tx_ref, PaymentStatus::Pending);
    backend.expect_fetch_payment_by_tx_ref().returning(move |_| Ok(Some(p.clone())));
    let (confirmed, p) = (order("ord-1", "alice", OrderStatusType::Confirmed), payment(&pending, tx_ref, PaymentStatus::Completed));
    backend
        .expect_settle_payment()
        .withf(|tx, id| tx == "ord-1-0badf00d" && id.as_deref() == Some("4411021"))
        .times(1)
        .returning(move |_, _| Ok(SettleOutcome::Settled { payment: p.clone(), order: confirmed.clone() }));
    backend.expect_set_gateway_event_outcome().withf(|id, outcome| *id == 7 && outcome == "Confirmed").times(1).returning(|_, _| Ok(()));
    let (status, body) = deliver(signed(&body(tx_ref, "successful", "21.50")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], "Confirmed");
}

#[actix_web::test]
async fn unknown_transactions_are_acknowledged_and_flagged() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    journalled(&mut backend);
    backend.expect_fetch_payment_by_tx_ref().returning(|_| Ok(None));
    backend
        .expect_insert_review_flag()
        .withf(|f| f.reason == ReviewReason::UnknownTransaction && f.tx_ref.as_deref() == Some("nobody-deadbeef"))
        .times(1)
        .returning(|_| Ok(flag(ReviewReason::UnknownTransaction)));
    backend.expect_set_gateway_event_outcome().times(1).returning(|_, _| Ok(()));
    let (status, body) =
        deliver(signed(&body("nobody-deadbeef", "successful", "100")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["success"], false);
}

#[actix_web::test]
async fn short_payment_is_acknowledged_but_not_applied() {
    let _ = env_logger::try_init().ok();
    let pending = order("ord-1", "alice", OrderStatusType::Pending);
    let tx_ref = "ord-1-0badf00d";
    let mut backend = MockBackend::new();
    journalled(&mut backend);
    let p = payment(&pending, tx_ref, PaymentStatus::Pending);
    backend.expect_fetch_payment_by_tx_ref().returning(move |_| Ok(Some(p.clone())));
    let failed = payment(&pending, tx_ref, PaymentStatus::Failed);
    backend.expect_fail_payment().times(1).returning(move |_| Ok(Some(failed.clone())));
    backend
        .expect_insert_review_flag()
        .withf(|f| f.reason == ReviewReason::AmountMismatch)
        .times(1)
        .returning(|_| Ok(flag(ReviewReason::AmountMismatch)));
    backend.expect_settle_payment().never();
    backend.expect_set_gateway_event_outcome().times(1).returning(|_, _| Ok(()));
    assert_eq!(pending.total, Money::from(2_150));
    let (status, body) = deliver(signed(&body(tx_ref, "successful", "21.49")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":false"#), "{body}");
}

#[actix_web::test]
async fn mismatch_after_a_concurrent_settlement_is_flagged_as_such() {
    let _ = env_logger::try_init().ok();
    let pending = order("ord-1", "alice", OrderStatusType::Pending);
    let tx_ref = "ord-1-0badf00d";
    let mut backend = MockBackend::new();
    journalled(&mut backend);
    let lookups = Arc::new(AtomicUsize::new(0));
    let (before, after) =
        (payment(&pending, tx_ref, PaymentStatus::Pending), payment(&pending, tx_ref, PaymentStatus::Completed));
    backend.expect_fetch_payment_by_tx_ref().times(2).returning(move |_| {
        match lookups.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(Some(before.clone())),
            _ => Ok(Some(after.clone())),
        }
    });
    backend.expect_fail_payment().times(1).returning(|_| Ok(None));
    backend
        .expect_insert_review_flag()
        .withf(|f| f.reason == ReviewReason::AmountMismatch && f.details.contains("already Completed"))
        .times(1)
        .returning(|_| Ok(flag(ReviewReason::AmountMismatch)));
    backend.expect_settle_payment().never();
    backend.expect_set_gateway_event_outcome().times(1).returning(|_, _| Ok(()));
    let (status, body) = deliver(signed(&body(tx_ref, "successful", "21.49")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":false"#), "{body}");
}

#[actix_web::test]
async fn busy_journal_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_insert_gateway_event()
        .returning(|_| Err(ReviewStoreError::StoreUnavailable("database is locked".into())));
    backend.expect_fetch_payment_by_tx_ref().never();
    let (status, body) =
        deliver(signed(&body("ord-1-0badf00d", "successful", "21.50")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.contains("locked"), "{body}");
}

#[actix_web::test]
async fn journal_failure_asks_for_a_retry() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_insert_gateway_event()
        .returning(|_| Err(ReviewStoreError::DatabaseError("database is locked".into())));
    backend.expect_fetch_payment_by_tx_ref().never();
    let (status, body) =
        deliver(signed(&body("ord-1-0badf00d", "successful", "21.50")), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!body.contains("locked"), "{body}");
}

#[actix_web::test]
async fn malformed_body_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_insert_gateway_event().never();
    let (status, _) = deliver(signed(r#"{"event":"charge.completed"}"#), backend, EventProducers::default()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn bad_signatures_are_refused_and_reported() {
    let _ = env_logger::try_init().ok();
    let rejected = Arc::new(AtomicUsize::new(0));
    let mut hooks = EventHooks::default();
    let counter = Arc::clone(&rejected);
    hooks.on_signature_rejected(move |ev| {
        assert!(ev.details.contains("HMAC signature"));
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(5, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let payload = body("ord-1-0badf00d", "successful", "21.50");
    let forged = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header((HEADER, calculate_hmac("guessed", payload.as_bytes())))
        .set_payload(payload.clone());
    let mut backend = MockBackend::new();
    backend.expect_insert_gateway_event().never();
    let (status, _) = deliver(forged, backend, producers.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unsigned = TestRequest::post().uri("/gateway/webhook").set_payload(payload);
    let mut backend = MockBackend::new();
    backend.expect_insert_gateway_event().never();
    let (status, _) = deliver(unsigned, backend, producers).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for _ in 0..50 {
        if rejected.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(rejected.load(Ordering::SeqCst), 2);
}
