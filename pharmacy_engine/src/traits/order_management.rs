use crate::{
    db_types::{Order, OrderCode, OrderId, OrderItem, OrderStatusChange, Payment, Prescription},
    order_objects::OrderQueryFilter,
    traits::PharmacyDbError,
};

/// Read-only queries over orders and everything they own.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PharmacyDbError>;

    /// Looks up an order by its short, shareable code. Codes are matched case-insensitively.
    async fn fetch_order_by_code(&self, code: &str) -> Result<Option<Order>, PharmacyDbError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PharmacyDbError>;

    /// The status history of the order, oldest first.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, PharmacyDbError>;

    async fn fetch_order_code(&self, order_id: &OrderId) -> Result<Option<OrderCode>, PharmacyDbError>;

    async fn fetch_payment_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, PharmacyDbError>;

    async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, PharmacyDbError>;

    async fn fetch_prescription(&self, order_id: &OrderId) -> Result<Option<Prescription>, PharmacyDbError>;

    /// Orders placed by the given user, newest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PharmacyDbError>;

    /// Orders matching every criterion in the filter, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PharmacyDbError>;
}
