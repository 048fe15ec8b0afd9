use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Payment};

/// A new order was placed. Published after the order has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderEvent {
    pub order: Order,
}

impl NewOrderEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// An order moved to a new status through a staff or customer action, or a processor-confirmed refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order: Order,
    pub old_status: Option<OrderStatusType>,
    pub actor_id: String,
    pub comment: Option<String>,
}

impl OrderStatusEvent {
    pub fn new(order: Order, actor_id: String) -> Self {
        Self { order, old_status: None, actor_id, comment: None }
    }

    pub fn with_old_status(mut self, status: OrderStatusType) -> Self {
        self.old_status = Some(status);
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}

/// Payment for an order was captured, by card or recorded offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub order: Order,
    pub payment: Payment,
}

impl PaymentEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum EventType {
    NewOrder(NewOrderEvent),
    OrderStatusUpdate(OrderStatusEvent),
    Payment(PaymentEvent),
}

impl EventType {
    /// The name live-update clients listen for.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::NewOrder(_) => "newOrder",
            EventType::OrderStatusUpdate(_) => "orderStatusUpdate",
            EventType::Payment(_) => "payment",
        }
    }
}
