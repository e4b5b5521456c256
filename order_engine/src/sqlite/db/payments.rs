use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewPayment, OrderId, Payment, PaymentStatus};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let now = Utc::now();
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                payment_id,
                order_id,
                tx_ref,
                amount,
                currency,
                status,
                payment_link,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_id)
    .bind(payment.order_id.as_str())
    .bind(payment.tx_ref)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(PaymentStatus::Pending)
    .bind(payment.payment_link)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payment {} [{}] saved for order {}", payment.payment_id, payment.tx_ref, payment.order_id);
    Ok(payment)
}

pub async fn fetch_payment_by_tx_ref(tx_ref: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE tx_ref = $1").bind(tx_ref).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn fetch_payment_with_status(
    order_id: &OrderId,
    statuses: &[PaymentStatus],
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payments = fetch_payments_for_order(order_id, conn).await?;
    Ok(payments.into_iter().rev().find(|p| statuses.contains(&p.status)))
}

/// Compare-and-swap on the payment status. Returns `None` if the payment was not in the `from` state.
pub async fn update_payment_status(
    tx_ref: &str,
    from: PaymentStatus,
    to: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET status = $1, updated_at = $2 WHERE tx_ref = $3 AND status = $4 RETURNING *",
    )
    .bind(to)
    .bind(Utc::now())
    .bind(tx_ref)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Payment [{tx_ref}] {from} -> {to}: {}", if payment.is_some() { "applied" } else { "guard failed" });
    Ok(payment)
}

/// `Pending` -> `Completed`, recording when the money arrived and the provider's own transaction id.
pub async fn complete_payment(
    tx_ref: &str,
    provider_tx_id: Option<String>,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                provider_tx_id = COALESCE($2, provider_tx_id),
                paid_at = $3,
                updated_at = $3
            WHERE tx_ref = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(PaymentStatus::Completed)
    .bind(provider_tx_id)
    .bind(paid_at)
    .bind(tx_ref)
    .bind(PaymentStatus::Pending)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
