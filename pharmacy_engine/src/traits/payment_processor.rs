use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Money, OrderId};

#[derive(Debug, Clone, Error)]
pub enum PaymentProcessorError {
    #[error("The payment processor could not be reached: {0}")]
    Unavailable(String),
    #[error("The payment processor refused the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub order_id: OrderId,
    pub order_code: String,
    pub order_number: i64,
    pub amount: Money,
    pub payer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub intent_id: String,
    pub client_secret: String,
    pub status: String,
    /// The payer name recorded on the intent, if the payer gave one.
    pub payer_name: Option<String>,
    pub order_id: Option<OrderId>,
}

impl GatewayIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// A request to return a card payment. The order and actor travel as metadata so that the processor's
/// `refund.created` callback can complete the refund locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub intent_id: String,
    pub order_id: OrderId,
    pub actor_id: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub status: String,
}

impl GatewayRefund {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// The card payment processor.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent, PaymentProcessorError>;

    async fn fetch_intent(&self, intent_id: &str) -> Result<GatewayIntent, PaymentProcessorError>;

    async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PaymentProcessorError>;
}
