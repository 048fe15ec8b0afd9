//! Data types shared by the storage backends and the public engine API.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use pharmacy_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The opaque, unguessable identifier of an order. The human-readable order number is [`Order::id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatusType {
    /// The order has been created and is waiting for payment.
    Placed,
    /// Payment for the order has been captured.
    Paid,
    /// The pharmacy has dispatched the order. Terminal.
    Fulfilled,
    /// The pharmacy declined the order. Can still be refunded if it was paid.
    Reject,
    /// The customer withdrew the order. Can still be refunded if it was paid.
    Cancel,
    /// The money has been returned to the customer. Terminal.
    Refund,
}

use OrderStatusType::*;

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 6] = [Placed, Paid, Fulfilled, Reject, Cancel, Refund];

    /// The states from which an order may move into `target`. `Placed` is only ever entered at creation.
    ///
    /// Moving to `Refund` from `Reject` or `Cancel` additionally requires a `Paid` entry in the status history, which
    /// the store checks.
    pub fn legal_sources(target: OrderStatusType) -> &'static [OrderStatusType] {
        match target {
            Placed => &[],
            Paid => &[Placed],
            Fulfilled => &[Paid],
            Reject => &[Placed, Paid],
            Cancel => &[Placed, Paid],
            Refund => &[Paid, Cancel, Reject],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatusType) -> bool {
        Self::legal_sources(target).contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Placed => "PLACED",
            Paid => "PAID",
            Fulfilled => "FULFILLED",
            Reject => "REJECT",
            Cancel => "CANCEL",
            Refund => "REFUND",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLACED" => Ok(Placed),
            "PAID" => Ok(Paid),
            "FULFILLED" => Ok(Fulfilled),
            "REJECT" => Ok(Reject),
            "CANCEL" => Ok(Cancel),
            "REFUND" => Ok(Refund),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Doctor,
    Staff,
    Admin,
}

impl Role {
    /// Pharmacy staff and admins may manage any order.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Doctor => write!(f, "doctor"),
            Role::Staff => write!(f, "staff"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "doctor" => Ok(Role::Doctor),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------         Actor         ---------------------------------------------------------
/// Whoever is performing an action. Identity is established upstream; the engine only checks roles and ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new<S: Into<String>>(user_id: S, role: Role) -> Self {
        Self { user_id: user_id.into(), role }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refund,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Refund => write!(f, "REFUND"),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    /// Paid through the card processor. Refunds go through the processor too.
    Card,
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Transfer => write!(f, "bank transfer"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CARD" => Ok(PaymentMethod::Card),
            "CASH" => Ok(PaymentMethod::Cash),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------   Users & Patients    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// A person a doctor orders for. Patients do not log in.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub id: String,
    pub doctor_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

//--------------------------------------   DeliveryAddress     ---------------------------------------------------------
/// Belongs to exactly one of a user or a patient.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub id: i64,
    pub user_id: Option<String>,
    pub patient_id: Option<String>,
    pub street: String,
    pub city: String,
    pub province: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressOwner {
    User(String),
    Patient(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeliveryAddress {
    pub owner: AddressOwner,
    pub street: String,
    pub city: String,
    pub province: String,
    pub phone: Option<String>,
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub requires_prescription: bool,
    /// Shipping weight of a single unit, in pounds
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub requires_prescription: bool,
    pub weight: f64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money, weight: f64) -> Self {
        Self { name: name.into(), price, image: None, requires_prescription: false, weight }
    }

    pub fn with_prescription(mut self) -> Self {
        self.requires_prescription = true;
        self
    }

    pub fn with_image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    /// The sequential order number shown to people
    pub id: i64,
    pub order_id: OrderId,
    /// The user who placed the order
    pub user_id: String,
    pub patient_id: Option<String>,
    pub address_id: i64,
    pub status: OrderStatusType,
    /// Items plus delivery, fixed at placement
    pub total_price: Money,
    pub delivery_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn items_price(&self) -> Money {
        self.total_price - self.delivery_price
    }
}

/// A snapshot of the product as it was when the order was placed.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: i64,
    pub quantity: i64,
    pub name: String,
    pub price: Money,
    pub image: Option<String>,
    pub requires_prescription: bool,
    pub weight: f64,
}

impl OrderItem {
    pub fn subtotal(&self) -> Money {
        self.price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub id: i64,
    pub order_id: OrderId,
    /// The user id of whoever caused the change
    pub actor_id: String,
    pub action: OrderStatusType,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderCode {
    pub order_id: OrderId,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Prescription {
    pub id: i64,
    pub order_id: OrderId,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    /// The processor's payment intent id. Offline payments have none.
    pub intent_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub method: PaymentMethod,
    pub payer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A processor-confirmed capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCapture {
    pub intent_id: String,
    /// The order the intent was created for, as recorded in the intent's metadata. Used when the payment row has
    /// since been pointed at a newer intent.
    pub order_id: Option<OrderId>,
    pub payer_name: Option<String>,
}

impl PaymentCapture {
    pub fn new<S: Into<String>>(intent_id: S) -> Self {
        Self { intent_id: intent_id.into(), order_id: None, payer_name: None }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_payer_name<S: Into<String>>(mut self, name: S) -> Self {
        self.payer_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transition_table() {
        let allowed = |from: OrderStatusType| -> Vec<OrderStatusType> {
            OrderStatusType::ALL.iter().copied().filter(|to| from.can_transition_to(*to)).collect()
        };
        assert_eq!(allowed(Placed), vec![Paid, Reject, Cancel]);
        assert_eq!(allowed(Paid), vec![Fulfilled, Reject, Cancel, Refund]);
        assert_eq!(allowed(Reject), vec![Refund]);
        assert_eq!(allowed(Cancel), vec![Refund]);
        assert!(allowed(Fulfilled).is_empty());
        assert!(allowed(Refund).is_empty());
    }

    #[test]
    fn status_strings() {
        for status in OrderStatusType::ALL {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert_eq!("cancel".parse::<OrderStatusType>().unwrap(), Cancel);
        assert!("Shipped".parse::<OrderStatusType>().is_err());
        assert_eq!(serde_json::to_string(&Fulfilled).unwrap(), "\"FULFILLED\"");
    }

    #[test]
    fn roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Staff.is_staff());
        assert!(!Role::Doctor.is_staff());
        assert!(!Role::User.is_staff());
        assert_eq!("Doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert!("pharmacist".parse::<Role>().is_err());
    }

    #[test]
    fn payment_methods() {
        assert!(PaymentMethod::Card.is_gateway());
        assert!(!PaymentMethod::Cash.is_gateway());
        assert_eq!("transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
    }
}
