use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Order, OrderCode, OrderId, OrderItem, OrderStatusType, Prescription},
    helpers::random_order_code,
    order_objects::OrderQueryFilter,
    traits::{NewOrderItemRecord, NewOrderRecord, PharmacyDbError},
};

const MAX_CODE_ATTEMPTS: usize = 16;

/// Inserts the order row. This is not atomic on its own; the order's items, code, prescription and first status
/// change must be written in the same transaction.
pub async fn insert_order(order: &NewOrderRecord, conn: &mut SqliteConnection) -> Result<Order, PharmacyDbError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                patient_id,
                address_id,
                status,
                total_price,
                delivery_price
            ) VALUES ($1, $2, $3, $4, 'PLACED', $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(&order.user_id)
    .bind(order.patient_id.as_deref())
    .bind(order.address_id)
    .bind(order.total_price)
    .bind(order.delivery_price)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn insert_order_item(
    order_id: &OrderId,
    item: &NewOrderItemRecord,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, PharmacyDbError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, quantity, name, price, image, requires_prescription, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(&item.name)
    .bind(item.price)
    .bind(item.image.as_deref())
    .bind(item.requires_prescription)
    .bind(item.weight)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

/// Binds a fresh random code to the order, retrying on collisions with existing codes.
pub async fn insert_order_code(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<OrderCode, PharmacyDbError> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = random_order_code();
        let inserted: Option<OrderCode> = sqlx::query_as(
            "INSERT INTO order_codes (order_id, code) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING RETURNING *",
        )
        .bind(order_id.as_str())
        .bind(&code)
        .fetch_optional(&mut *conn)
        .await?;
        match inserted {
            Some(code) => return Ok(code),
            None => trace!("📝️ Order code {code} is taken (attempt {attempt})"),
        }
    }
    Err(PharmacyDbError::CodeGenerationFailed(MAX_CODE_ATTEMPTS))
}

pub async fn insert_prescription(
    order_id: &OrderId,
    image_url: &str,
    conn: &mut SqliteConnection,
) -> Result<Prescription, PharmacyDbError> {
    let prescription = sqlx::query_as("INSERT INTO prescriptions (order_id, image_url) VALUES ($1, $2) RETURNING *")
        .bind(order_id.as_str())
        .bind(image_url)
        .fetch_one(conn)
        .await?;
    Ok(prescription)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_order_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT orders.* FROM orders JOIN order_codes USING (order_id) WHERE order_codes.code = $1")
        .bind(code.trim())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn fetch_order_code(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<OrderCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_codes WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_prescription(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Prescription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM prescriptions WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY id DESC").bind(user_id).fetch_all(conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are sorted by order number, i.e. oldest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(patient_id) = query.patient_id {
        where_clause.push("patient_id = ");
        where_clause.push_bind_unseparated(patient_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("datetime(created_at) >= datetime(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("datetime(created_at) <= datetime(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY id ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Moves the order to `target` only if its current status is one of `target`'s legal sources.
///
/// Returns `None` when the order does not exist or the guard failed. Nothing is written in that case.
pub async fn update_status_if_legal(
    order_id: &OrderId,
    target: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let sources = OrderStatusType::legal_sources(target);
    if sources.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(target.as_str());
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in sources {
        statuses.push_bind(status.as_str());
    }
    statuses.push_unseparated(")");
    if target == OrderStatusType::Refund {
        // Cancelled and rejected orders can only be refunded if money was taken for them, and only once. Money
        // captured after the order was closed shows up on the payment but not in the log.
        builder.push(
            " AND (EXISTS (SELECT 1 FROM order_status_changes s WHERE s.order_id = orders.order_id AND s.action = \
             'PAID') OR EXISTS (SELECT 1 FROM payments p WHERE p.order_id = orders.order_id AND p.status = 'PAID')) \
             AND NOT EXISTS (SELECT 1 FROM order_status_changes s WHERE s.order_id = orders.order_id AND s.action = \
             'REFUND')",
        );
    }
    builder.push(" RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    if let Some(o) = &order {
        debug!("📝️ Order #{} [{}] is now {target}", o.id, o.order_id);
    }
    Ok(order)
}

/// Marks the order paid if it is still PLACED. The order is found through the payment carrying `intent_id`, or
/// `fallback` if no payment carries that intent.
pub async fn mark_paid_by_intent(
    intent_id: &str,
    fallback: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'PAID', updated_at = CURRENT_TIMESTAMP
            WHERE status = 'PLACED'
              AND order_id = COALESCE((SELECT order_id FROM payments WHERE intent_id = $1), $2)
            RETURNING *;
        "#,
    )
    .bind(intent_id)
    .bind(fallback.map(|id| id.as_str()))
    .fetch_optional(conn)
    .await
}
