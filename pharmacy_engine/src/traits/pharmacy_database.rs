use thiserror::Error;

use crate::{
    db_types::{Money, Order, OrderCode, OrderId, OrderStatusType, Payment, PaymentCapture, PaymentMethod},
    traits::{
        data_objects::{NewOrderRecord, PaymentConfirmation, RefundRecord},
        CatalogManagement,
        OrderManagement,
    },
};

#[derive(Debug, Clone, Error)]
pub enum PharmacyDbError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No payment is associated with {0}")]
    PaymentNotFound(String),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    IllegalTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("{0} transitions carry extra bookkeeping and cannot be applied directly")]
    UnsupportedTransition(OrderStatusType),
    #[error("The payment for order {0} has already been captured")]
    PaymentAlreadyCaptured(OrderId),
    #[error("Could not generate a unique order code after {0} attempts")]
    CodeGenerationFailed(usize),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
}

impl From<sqlx::Error> for PharmacyDbError {
    fn from(e: sqlx::Error) -> Self {
        PharmacyDbError::DatabaseError(e.to_string())
    }
}

/// The mutating half of the order store.
///
/// Every method runs as a single atomic transaction. Guards are evaluated by the same conditional statement that
/// performs the change, so concurrent callers (a webhook redelivery racing a browser return, say) can never both
/// apply a transition.
#[allow(async_fn_in_trait)]
pub trait PharmacyDatabase: Clone + OrderManagement + CatalogManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores the order, its item snapshots, a fresh unique order code, the optional prescription and the PLACED
    /// status change.
    async fn insert_order(&self, order: NewOrderRecord) -> Result<(Order, OrderCode), PharmacyDbError>;

    /// Moves an order to `target` if, and only if, its current status is one of the legal sources for `target`, and
    /// appends the status change. Returns the updated order and the status it moved from.
    ///
    /// A failed guard writes nothing and reports [`PharmacyDbError::OrderNotFound`] or
    /// [`PharmacyDbError::IllegalTransition`]. Payment and refund transitions must go through
    /// [`Self::confirm_payment`], [`Self::record_offline_payment`] and [`Self::record_refund`] instead.
    async fn transition_order(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
        actor_id: &str,
        comment: Option<&str>,
    ) -> Result<(Order, OrderStatusType), PharmacyDbError>;

    /// Creates or replaces the card payment record for the order. A payment that has been captured or refunded is
    /// never overwritten ([`PharmacyDbError::PaymentAlreadyCaptured`]).
    async fn upsert_payment_intent(
        &self,
        order_id: &OrderId,
        intent_id: &str,
        client_secret: &str,
        amount: Money,
    ) -> Result<Payment, PharmacyDbError>;

    /// Marks the order paid in response to a processor-confirmed capture.
    ///
    /// Repeated confirmations for an order that already has a PAID entry in its history are reported as
    /// [`PaymentConfirmation::AlreadyPaid`] and change nothing. A capture for an order that was cancelled or rejected
    /// before it was paid marks the payment as paid without touching the order, and is reported as
    /// [`PaymentConfirmation::CapturedAfterClose`].
    async fn confirm_payment(&self, capture: PaymentCapture) -> Result<PaymentConfirmation, PharmacyDbError>;

    /// Records a cash or transfer payment against a PLACED order and marks it paid.
    async fn record_offline_payment(
        &self,
        order_id: &OrderId,
        method: PaymentMethod,
        payer_name: Option<&str>,
        actor_id: &str,
    ) -> Result<(Order, Payment), PharmacyDbError>;

    /// Marks the order and its payment as refunded.
    ///
    /// The order must be PAID, CANCEL or REJECT and must have been paid at some point. If the refund has already
    /// been recorded, [`RefundRecord::AlreadyRefunded`] is returned and nothing changes.
    async fn record_refund(
        &self,
        order_id: &OrderId,
        actor_id: &str,
        comment: Option<&str>,
    ) -> Result<RefundRecord, PharmacyDbError>;
}
