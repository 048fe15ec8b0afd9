use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, OrderId, Payment, PaymentMethod},
    traits::PharmacyDbError,
};

/// Creates the order's card payment, or replaces the intent on a payment that is still pending.
///
/// Returns `None` if the order's payment has already been captured or refunded.
pub async fn upsert_intent(
    order_id: &OrderId,
    intent_id: &str,
    client_secret: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, PharmacyDbError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, intent_id, client_secret, status, amount, method)
            VALUES ($1, $2, $3, 'PENDING', $4, 'CARD')
            ON CONFLICT (order_id) DO UPDATE SET
                intent_id = excluded.intent_id,
                client_secret = excluded.client_secret,
                amount = excluded.amount,
                method = 'CARD',
                updated_at = CURRENT_TIMESTAMP
            WHERE payments.status = 'PENDING'
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(intent_id)
    .bind(client_secret)
    .bind(amount)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// Marks the order's payment as captured by the card processor, creating the record if the intent was never stored
/// locally.
pub async fn capture_card_payment(
    order_id: &OrderId,
    intent_id: &str,
    amount: Money,
    payer_name: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PharmacyDbError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, intent_id, status, amount, method, payer_name)
            VALUES ($1, $2, 'PAID', $3, 'CARD', $4)
            ON CONFLICT (order_id) DO UPDATE SET
                intent_id = excluded.intent_id,
                status = 'PAID',
                method = 'CARD',
                payer_name = COALESCE(excluded.payer_name, payments.payer_name),
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(intent_id)
    .bind(amount)
    .bind(payer_name)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

/// Records a cash or bank transfer payment. Any pending card intent on the order is superseded.
pub async fn capture_offline_payment(
    order_id: &OrderId,
    method: PaymentMethod,
    amount: Money,
    payer_name: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PharmacyDbError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, status, amount, method, payer_name)
            VALUES ($1, 'PAID', $2, $3, $4)
            ON CONFLICT (order_id) DO UPDATE SET
                intent_id = NULL,
                client_secret = NULL,
                status = 'PAID',
                amount = excluded.amount,
                method = excluded.method,
                payer_name = excluded.payer_name,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(amount)
    .bind(method)
    .bind(payer_name)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn mark_refunded(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment: Option<Payment> = sqlx::query_as(
        "UPDATE payments SET status = 'REFUND', updated_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND status = \
         'PAID' RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &payment {
        debug!("🔄️ Payment {} for order {order_id} marked as refunded", p.id);
    }
    Ok(payment)
}

pub async fn fetch_payment_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_payment_by_intent(
    intent_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE intent_id = $1").bind(intent_id).fetch_optional(conn).await
}
