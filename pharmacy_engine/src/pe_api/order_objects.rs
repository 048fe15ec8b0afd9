use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Money, Order, OrderId, OrderItem, OrderStatusChange, OrderStatusType, Payment, Prescription},
    pe_api::errors::OrderFlowError,
    pricing::PriceBreakdown,
};

//--------------------------------------     Placing orders      -----------------------------------------------------
/// The most units of a single product one order may contain.
pub const MAX_ITEM_QUANTITY: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

/// An order as submitted from the checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
    /// Set when a doctor orders on behalf of one of their patients
    #[serde(default)]
    pub patient_id: Option<String>,
    pub address_id: i64,
    pub items: Vec<NewOrderItem>,
    /// Where the uploaded prescription image is stored. Required if any item needs a prescription.
    #[serde(default)]
    pub prescription_url: Option<String>,
}

impl NewOrder {
    pub fn new(address_id: i64) -> Self {
        Self { address_id, ..Default::default() }
    }

    pub fn with_item(mut self, product_id: i64, quantity: i64) -> Self {
        self.items.push(NewOrderItem { product_id, quantity });
        self
    }

    pub fn for_patient<S: Into<String>>(mut self, patient_id: S) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_prescription<S: Into<String>>(mut self, url: S) -> Self {
        self.prescription_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub code: String,
    pub breakdown: PriceBreakdown,
}

//--------------------------------------        Payments         -----------------------------------------------------
/// What the browser needs to complete a card payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResult {
    pub order_id: OrderId,
    pub intent_id: String,
    pub client_secret: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RefundOutcome {
    /// The processor accepted the refund. The order is marked refunded when the processor confirms it.
    Initiated { refund_id: String, order: Order },
    /// An offline payment was refunded and the order is now marked refunded.
    Completed { order: Order },
}

//--------------------------------------      Order queries      -----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<OrderStatusChange>,
    pub code: Option<String>,
    pub payment: Option<Payment>,
    pub prescription: Option<Prescription>,
}

/// The public view of an order, shown to anyone holding its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestOrderView {
    pub order_number: i64,
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub total_price: Money,
    pub delivery_price: Money,
    pub items: Vec<GuestOrderItem>,
    pub payable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestOrderItem {
    pub name: String,
    pub quantity: i64,
    pub price: Money,
    pub image: Option<String>,
}

impl From<&OrderItem> for GuestOrderItem {
    fn from(item: &OrderItem) -> Self {
        Self { name: item.name.clone(), quantity: item.quantity, price: item.price, image: item.image.clone() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub user_id: Option<String>,
    pub patient_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn since<T>(mut self, since: T) -> Result<Self, OrderFlowError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = since.try_into().map_err(|e| OrderFlowError::Validation(e.to_string()))?;
        self.since = Some(dt);
        Ok(self)
    }

    pub fn until<T>(mut self, until: T) -> Result<Self, OrderFlowError>
    where
        T: TryInto<DateTime<Utc>>,
        T::Error: Display,
    {
        let dt = until.try_into().map_err(|e| OrderFlowError::Validation(e.to_string()))?;
        self.until = Some(dt);
        Ok(self)
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_patient_id<S: Into<String>>(mut self, patient_id: S) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.user_id.is_none() &&
            self.patient_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(user_id) = &self.user_id {
            write!(f, "user_id: {user_id}. ")?;
        }
        if let Some(patient_id) = &self.patient_id {
            write!(f, "patient_id: {patient_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}
