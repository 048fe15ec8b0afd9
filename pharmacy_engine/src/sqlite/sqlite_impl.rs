//! `SqliteDatabase` is a concrete implementation of a pharmacy order store.
//!
//! It uses SQLite as the backend and implements all the storage traits defined in the [`crate::traits`] module.
//!
//! Every mutating method opens a transaction whose first statement is a write. The guarded `UPDATE` decides whether
//! the change applies; follow-up reads inside the same transaction then see a consistent view.
use std::fmt::Debug;

use log::*;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::db::{catalog, db_url, new_pool, orders, payments, status_changes};
use crate::{
    db_types::{
        DeliveryAddress,
        Money,
        NewDeliveryAddress,
        NewPatient,
        NewProduct,
        NewUser,
        Order,
        OrderCode,
        OrderId,
        OrderItem,
        OrderStatusChange,
        OrderStatusType,
        Patient,
        Payment,
        PaymentCapture,
        PaymentMethod,
        PaymentStatus,
        Prescription,
        Product,
        User,
    },
    order_objects::OrderQueryFilter,
    traits::{
        CatalogManagement,
        NewOrderRecord,
        OrderManagement,
        PaymentConfirmation,
        PharmacyDatabase,
        PharmacyDbError,
        RefundRecord,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `RX_DATABASE_URL`
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Brings the schema up to date. Already-applied migrations are skipped.
    pub async fn migrate(&self) -> Result<(), PharmacyDbError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PharmacyDbError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Works out why a guarded status update on `order_id` did not apply.
    async fn explain_failed_guard(
        order_id: &OrderId,
        target: OrderStatusType,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> PharmacyDbError {
        match orders::fetch_order_by_order_id(order_id, tx).await {
            Ok(Some(order)) => {
                PharmacyDbError::IllegalTransition { order_id: order_id.clone(), from: order.status, to: target }
            },
            Ok(None) => PharmacyDbError::OrderNotFound(order_id.clone()),
            Err(e) => e.into(),
        }
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_code(&self, code: &str) -> Result<Option<Order>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_code(code, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let history = status_changes::fetch_status_history(order_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_order_code(&self, order_id: &OrderId) -> Result<Option<OrderCode>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let code = orders::fetch_order_code(order_id, &mut conn).await?;
        Ok(code)
    }

    async fn fetch_payment_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_intent(intent_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_prescription(&self, order_id: &OrderId) -> Result<Option<Prescription>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let prescription = orders::fetch_prescription(order_id, &mut conn).await?;
        Ok(prescription)
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_products(&self, ids: &[i64]) -> Result<Vec<Product>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let products = catalog::fetch_products(ids, &mut conn).await?;
        Ok(products)
    }

    async fn fetch_delivery_address(&self, id: i64) -> Result<Option<DeliveryAddress>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let address = catalog::fetch_delivery_address(id, &mut conn).await?;
        Ok(address)
    }

    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let user = catalog::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_patient(&self, patient_id: &str) -> Result<Option<Patient>, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        let patient = catalog::fetch_patient(patient_id, &mut conn).await?;
        Ok(patient)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_user(user, &mut conn).await
    }

    async fn insert_patient(&self, patient: NewPatient) -> Result<Patient, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_patient(patient, &mut conn).await
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_product(product, &mut conn).await
    }

    async fn update_product_price(&self, id: i64, price: Money) -> Result<Product, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::update_product_price(id, price, &mut conn).await
    }

    async fn insert_delivery_address(&self, address: NewDeliveryAddress) -> Result<DeliveryAddress, PharmacyDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_delivery_address(address, &mut conn).await
    }
}

impl PharmacyDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Stores a new order in a single atomic transaction:
    /// * the order row, with status PLACED and the computed prices,
    /// * a snapshot of every item,
    /// * a fresh order code,
    /// * the prescription, if one was supplied,
    /// * the PLACED entry in the status log, attributed to the ordering user.
    async fn insert_order(&self, record: NewOrderRecord) -> Result<(Order, OrderCode), PharmacyDbError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(&record, &mut tx).await?;
        for item in &record.items {
            orders::insert_order_item(&order.order_id, item, &mut tx).await?;
        }
        let code = orders::insert_order_code(&order.order_id, &mut tx).await?;
        if let Some(url) = record.prescription_url.as_deref() {
            orders::insert_prescription(&order.order_id, url, &mut tx).await?;
        }
        status_changes::insert_status_change(&order.order_id, &order.user_id, OrderStatusType::Placed, None, &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} [{}] saved with code {}", order.id, order.order_id, code.code);
        Ok((order, code))
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
        actor_id: &str,
        comment: Option<&str>,
    ) -> Result<(Order, OrderStatusType), PharmacyDbError> {
        if matches!(target, OrderStatusType::Placed | OrderStatusType::Paid | OrderStatusType::Refund) {
            return Err(PharmacyDbError::UnsupportedTransition(target));
        }
        let mut tx = self.pool.begin().await?;
        match orders::update_status_if_legal(order_id, target, &mut tx).await? {
            Some(order) => {
                let old_status =
                    status_changes::last_logged_status(order_id, &mut tx).await?.unwrap_or(OrderStatusType::Placed);
                status_changes::insert_status_change(order_id, actor_id, target, comment, &mut tx).await?;
                tx.commit().await?;
                Ok((order, old_status))
            },
            None => {
                let err = Self::explain_failed_guard(order_id, target, &mut tx).await;
                tx.rollback().await?;
                debug!("🗃️ Could not move order {order_id} to {target}. {err}");
                Err(err)
            },
        }
    }

    async fn upsert_payment_intent(
        &self,
        order_id: &OrderId,
        intent_id: &str,
        client_secret: &str,
        amount: Money,
    ) -> Result<Payment, PharmacyDbError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::upsert_intent(order_id, intent_id, client_secret, amount, &mut tx).await?;
        tx.commit().await?;
        match payment {
            Some(p) => {
                debug!("🗃️ Payment intent {intent_id} stored for order {order_id}");
                Ok(p)
            },
            None => Err(PharmacyDbError::PaymentAlreadyCaptured(order_id.clone())),
        }
    }

    async fn confirm_payment(&self, capture: PaymentCapture) -> Result<PaymentConfirmation, PharmacyDbError> {
        let PaymentCapture { intent_id, order_id, payer_name } = capture;
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::mark_paid_by_intent(&intent_id, order_id.as_ref(), &mut tx).await? {
            let payment = payments::capture_card_payment(
                &order.order_id,
                &intent_id,
                order.total_price,
                payer_name.as_deref(),
                &mut tx,
            )
            .await?;
            status_changes::insert_status_change(
                &order.order_id,
                &order.user_id,
                OrderStatusType::Paid,
                Some("Paid by card"),
                &mut tx,
            )
            .await?;
            tx.commit().await?;
            info!("🗃️ Order {} has been paid with intent {intent_id}", order.order_id);
            return Ok(PaymentConfirmation::Confirmed { order, payment });
        }
        // The guard did not apply. Work out whether this is a duplicate or a genuine problem.
        let known = match payments::fetch_payment_by_intent(&intent_id, &mut tx).await? {
            Some(payment) => Some(payment.order_id),
            None => order_id,
        };
        let Some(order_id) = known else {
            tx.rollback().await?;
            return Err(PharmacyDbError::PaymentNotFound(intent_id));
        };
        let order = orders::fetch_order_by_order_id(&order_id, &mut tx).await?;
        let payment_status = payments::fetch_payment_for_order(&order_id, &mut tx).await?.map(|p| p.status);
        let already_paid = status_changes::has_entry(&order_id, OrderStatusType::Paid, &mut tx).await?
            || matches!(payment_status, Some(PaymentStatus::Paid | PaymentStatus::Refund));
        match order {
            None => {
                tx.rollback().await?;
                Err(PharmacyDbError::OrderNotFound(order_id))
            },
            Some(order) if already_paid => {
                tx.rollback().await?;
                debug!("🗃️ Order {order_id} was already paid. Ignoring repeat confirmation for {intent_id}");
                Ok(PaymentConfirmation::AlreadyPaid { order })
            },
            Some(order) if matches!(order.status, OrderStatusType::Cancel | OrderStatusType::Reject) => {
                let payment = payments::capture_card_payment(
                    &order_id,
                    &intent_id,
                    order.total_price,
                    payer_name.as_deref(),
                    &mut tx,
                )
                .await?;
                tx.commit().await?;
                warn!(
                    "🗃️ Payment {intent_id} was captured for order {order_id} after it became {}. The payment is recorded \
                     and must be refunded.",
                    order.status
                );
                Ok(PaymentConfirmation::CapturedAfterClose { order, payment })
            },
            Some(order) => {
                tx.rollback().await?;
                warn!("🗃️ Payment {intent_id} was captured for order {order_id}, which is {}", order.status);
                Err(PharmacyDbError::IllegalTransition { order_id, from: order.status, to: OrderStatusType::Paid })
            },
        }
    }

    async fn record_offline_payment(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
        payer_name: Option<&str>,
        actor_id: &str,
    ) -> Result<(Order, Payment), PharmacyDbError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::update_status_if_legal(order_id, OrderStatusType::Paid, &mut tx).await? else {
            let err = Self::explain_failed_guard(order_id, OrderStatusType::Paid, &mut tx).await;
            tx.rollback().await?;
            return Err(err);
        };
        let payment = payments::capture_offline_payment(order_id, method, order.total_price, payer_name, &mut tx).await?;
        let comment = format!("Paid by {method}");
        status_changes::insert_status_change(order_id, actor_id, OrderStatusType::Paid, Some(&comment), &mut tx)
            .await?;
        tx.commit().await?;
        info!("🗃️ Order {order_id} has been paid by {method}. Recorded by {actor_id}");
        Ok((order, payment))
    }

    async fn record_refund(
        &self,
        order_id: &OrderId,
        actor_id: &str,
        comment: Option<&str>,
    ) -> Result<RefundRecord, PharmacyDbError> {
        let mut tx = self.pool.begin().await?;
        if let Some(order) = orders::update_status_if_legal(order_id, OrderStatusType::Refund, &mut tx).await? {
            // Every status change is logged, so the last entry is the status the order just left
            let old_status =
                status_changes::last_logged_status(order_id, &mut tx).await?.unwrap_or(OrderStatusType::Paid);
            if payments::mark_refunded(order_id, &mut tx).await?.is_none() {
                warn!("🗃️ Order {order_id} was refunded, but it has no captured payment record");
            }
            status_changes::insert_status_change(order_id, actor_id, OrderStatusType::Refund, comment, &mut tx)
                .await?;
            tx.commit().await?;
            info!("🗃️ Order {order_id} has been refunded ({old_status} -> REFUND)");
            return Ok(RefundRecord::Refunded { order, old_status });
        }
        let order = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
        let refunded = status_changes::has_entry(order_id, OrderStatusType::Refund, &mut tx).await?;
        tx.rollback().await?;
        match order {
            None => Err(PharmacyDbError::OrderNotFound(order_id.clone())),
            Some(order) if refunded || order.status == OrderStatusType::Refund => {
                debug!("🗃️ Order {order_id} was already refunded. Nothing to do");
                Ok(RefundRecord::AlreadyRefunded { order })
            },
            Some(order) => Err(PharmacyDbError::IllegalTransition {
                order_id: order_id.clone(),
                from: order.status,
                to: OrderStatusType::Refund,
            }),
        }
    }
}
