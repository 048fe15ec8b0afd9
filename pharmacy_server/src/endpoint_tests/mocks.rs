use mockall::mock;
use pharmacy_engine::{
    db_types::{Order, OrderCode, OrderId, OrderItem, OrderStatusChange, Payment, Prescription},
    order_objects::OrderQueryFilter,
    traits::{OrderManagement, PharmacyDbError},
};

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PharmacyDbError>;
        async fn fetch_order_by_code(&self, code: &str) -> Result<Option<Order>, PharmacyDbError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PharmacyDbError>;
        async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<OrderStatusChange>, PharmacyDbError>;
        async fn fetch_order_code(&self, order_id: &OrderId) -> Result<Option<OrderCode>, PharmacyDbError>;
        async fn fetch_payment_for_order(&self, order_id: &OrderId) -> Result<Option<Payment>, PharmacyDbError>;
        async fn fetch_payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, PharmacyDbError>;
        async fn fetch_prescription(&self, order_id: &OrderId) -> Result<Option<Prescription>, PharmacyDbError>;
        async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PharmacyDbError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PharmacyDbError>;
    }
}
