use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use log::debug;
use order_engine::db_types::{Money, Order, OrderId, OrderStatusType, Payment, PaymentStatus, Role};

use crate::auth::{OWNER_ID_HEADER, OWNER_ROLE_HEADER};

/// Adds the identity headers the authenticating proxy would set.
pub fn as_caller(req: TestRequest, owner_id: &str, role: Role) -> TestRequest {
    req.insert_header((OWNER_ID_HEADER, owner_id)).insert_header((OWNER_ROLE_HEADER, role.to_string()))
}

/// Sends `req` to an app built by `configure` and returns the status and body, whether the request was answered by a
/// handler or rejected by a middleware.
pub async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let service = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn order(order_id: &str, owner_id: &str, status: OrderStatusType) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        owner_id: owner_id.to_string(),
        status,
        subtotal: Money::from(2_000),
        tax: Money::from(150),
        shipping_cost: Money::default(),
        total: Money::from(2_150),
        currency: "NGN".to_string(),
        shipping_address: "12 Marina Road, Lagos".to_string(),
        billing_address: None,
        payment_method: "card".to_string(),
        created_at: ts,
        updated_at: ts,
    }
}

pub fn payment(order: &Order, tx_ref: &str, status: PaymentStatus) -> Payment {
    let ts = Utc.with_ymd_and_hms(2024, 9, 1, 12, 5, 0).unwrap();
    Payment {
        id: 1,
        payment_id: "pay-1".to_string(),
        order_id: order.order_id.clone(),
        tx_ref: tx_ref.to_string(),
        amount: order.total,
        currency: order.currency.clone(),
        status,
        payment_link: format!("https://checkout.example.com/pay/{tx_ref}"),
        provider_tx_id: None,
        paid_at: None,
        created_at: ts,
        updated_at: ts,
    }
}
