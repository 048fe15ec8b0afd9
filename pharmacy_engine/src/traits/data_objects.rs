use serde::{Deserialize, Serialize};

use crate::db_types::{Money, Order, OrderId, OrderStatusType, Payment, Product};

/// Everything needed to persist a new order in one go. Prices have already been computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRecord {
    pub order_id: OrderId,
    pub user_id: String,
    pub patient_id: Option<String>,
    pub address_id: i64,
    pub total_price: Money,
    pub delivery_price: Money,
    pub items: Vec<NewOrderItemRecord>,
    pub prescription_url: Option<String>,
}

/// A frozen copy of a product's details at the time of ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItemRecord {
    pub product_id: i64,
    pub quantity: i64,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub requires_prescription: bool,
    pub weight: f64,
}

impl NewOrderItemRecord {
    pub fn snapshot(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            quantity,
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            requires_prescription: product.requires_prescription,
            weight: product.weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentConfirmation {
    /// The order moved from PLACED to PAID.
    Confirmed { order: Order, payment: Payment },
    /// The order had already been marked as paid. Nothing was changed.
    AlreadyPaid { order: Order },
    /// The money was captured after the order was cancelled or rejected. The payment is recorded as paid so that it
    /// can be refunded, but the order keeps its status.
    CapturedAfterClose { order: Order, payment: Payment },
}

impl PaymentConfirmation {
    pub fn order(&self) -> &Order {
        match self {
            PaymentConfirmation::Confirmed { order, .. } => order,
            PaymentConfirmation::AlreadyPaid { order } => order,
            PaymentConfirmation::CapturedAfterClose { order, .. } => order,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PaymentConfirmation::AlreadyPaid { .. })
    }

    /// True if the captured money belongs to an order that will not be fulfilled and has to be refunded.
    pub fn needs_refund(&self) -> bool {
        matches!(self, PaymentConfirmation::CapturedAfterClose { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundRecord {
    /// The order and its payment are now marked as refunded.
    Refunded { order: Order, old_status: OrderStatusType },
    /// The refund had already been recorded. Nothing was changed.
    AlreadyRefunded { order: Order },
}

impl RefundRecord {
    pub fn order(&self) -> &Order {
        match self {
            RefundRecord::Refunded { order, .. } => order,
            RefundRecord::AlreadyRefunded { order } => order,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RefundRecord::AlreadyRefunded { .. })
    }
}
