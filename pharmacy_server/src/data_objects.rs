use std::fmt::Display;

use pharmacy_engine::db_types::PaymentMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentParams {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectParams {
    pub reason: String,
}

/// A cash or transfer payment taken by staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflinePaymentParams {
    pub method: PaymentMethod,
    #[serde(default)]
    pub payer_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentIntentParams {
    /// Who is paying, when it is not the person who placed the order
    #[serde(default)]
    pub payer_name: Option<String>,
}

/// Sent by the browser when the card processor redirects back to the payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReturnParams {
    pub intent_id: String,
}
