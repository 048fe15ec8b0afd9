use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, OrderStatusChange, OrderStatusType},
    traits::PharmacyDbError,
};

/// Appends an entry to the order's status log. The log is append-only; the database rejects updates and deletes.
pub async fn insert_status_change(
    order_id: &OrderId,
    actor_id: &str,
    action: OrderStatusType,
    comment: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusChange, PharmacyDbError> {
    let change = sqlx::query_as(
        r#"
            INSERT INTO order_status_changes (order_id, actor_id, action, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(actor_id)
    .bind(action.as_str())
    .bind(comment)
    .fetch_one(conn)
    .await?;
    Ok(change)
}

/// The order's status log, oldest first.
pub async fn fetch_status_history(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusChange>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_changes WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn has_entry(
    order_id: &OrderId,
    action: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_status_changes WHERE order_id = $1 AND action = $2")
        .bind(order_id.as_str())
        .bind(action.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// The action of the most recent entry in the order's log, which is the order's status before any change that has
/// not been logged yet.
pub async fn last_logged_status(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatusType>, sqlx::Error> {
    sqlx::query_scalar("SELECT action FROM order_status_changes WHERE order_id = $1 ORDER BY id DESC LIMIT 1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}
