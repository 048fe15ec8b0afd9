use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, Order, OrderId, OrderStatusChange, OrderStatusType},
    pe_api::{
        errors::OrderFlowError,
        order_objects::{GuestOrderItem, GuestOrderView, OrderDetails, OrderQueryFilter},
    },
    traits::OrderManagement,
};

/// Read access to orders for dashboards and the guest payment page.
///
/// Staff see every order. Everyone else only sees the orders they placed.
pub struct OrdersApi<B> {
    db: B,
}

impl<B> Debug for OrdersApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrdersApi")
    }
}

impl<B> OrdersApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrdersApi<B>
where B: OrderManagement
{
    pub async fn order_details(&self, actor: &Actor, order_id: &OrderId) -> Result<OrderDetails, OrderFlowError> {
        let order = self.visible_order(actor, order_id).await?;
        let items = self.db.fetch_order_items(order_id).await?;
        let history = self.db.fetch_status_history(order_id).await?;
        let code = self.db.fetch_order_code(order_id).await?.map(|c| c.code);
        let payment = self.db.fetch_payment_for_order(order_id).await?;
        let prescription = self.db.fetch_prescription(order_id).await?;
        Ok(OrderDetails { order, items, history, code, payment, prescription })
    }

    pub async fn status_history(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<Vec<OrderStatusChange>, OrderFlowError> {
        let _ = self.visible_order(actor, order_id).await?;
        Ok(self.db.fetch_status_history(order_id).await?)
    }

    /// What anyone holding the order's code may see. No personal details are included.
    pub async fn guest_order(&self, code: &str) -> Result<GuestOrderView, OrderFlowError> {
        let code = code.trim();
        let order = self
            .db
            .fetch_order_by_code(code)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("There is no order with code {code}")))?;
        let items = self.db.fetch_order_items(&order.order_id).await?;
        trace!("🔎️ Guest lookup of order #{} by code", order.id);
        Ok(GuestOrderView {
            order_number: order.id,
            order_id: order.order_id,
            status: order.status,
            total_price: order.total_price,
            delivery_price: order.delivery_price,
            items: items.iter().map(GuestOrderItem::from).collect(),
            payable: order.status == OrderStatusType::Placed,
        })
    }

    /// All orders for staff, otherwise the actor's own orders. Newest first.
    pub async fn orders_for_actor(&self, actor: &Actor) -> Result<Vec<Order>, OrderFlowError> {
        if actor.is_staff() {
            let mut orders = self.db.search_orders(OrderQueryFilter::default()).await?;
            orders.reverse();
            Ok(orders)
        } else {
            Ok(self.db.fetch_orders_for_user(&actor.user_id).await?)
        }
    }

    /// Filtered search over every order. Staff only.
    pub async fn search_orders(&self, actor: &Actor, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        if !actor.is_staff() {
            return Err(OrderFlowError::Forbidden("Only pharmacy staff can search orders".into()));
        }
        debug!("🔎️ Order search by {}. {query}", actor.user_id);
        Ok(self.db.search_orders(query).await?)
    }

    async fn visible_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("Order {order_id}")))?;
        if actor.is_staff() || order.user_id == actor.user_id {
            Ok(order)
        } else {
            Err(OrderFlowError::Forbidden(format!("Order {order_id} belongs to someone else")))
        }
    }
}
