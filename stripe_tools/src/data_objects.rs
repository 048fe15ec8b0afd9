use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stripe metadata is a flat map of string keys to string values.
pub type Metadata = BTreeMap<String, String>;

//--------------------------------------   PaymentIntent     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Only present on responses to the secret-key holder. Webhook payloads carry it too.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// The amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub description: Option<String>,
    pub metadata: Metadata,
}

impl NewPaymentIntent {
    pub fn new<S: Into<String>>(amount: i64, currency: S) -> Self {
        Self { amount, currency: currency.into(), ..Default::default() }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(d) = &self.description {
            params.push(("description".to_string(), d.clone()));
        }
        params.extend(metadata_params(&self.metadata));
        params
    }
}

//--------------------------------------       Refund        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    RequiresAction,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub payment_intent: Option<String>,
    pub status: RefundStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct NewRefund {
    pub payment_intent: String,
    pub metadata: Metadata,
}

impl NewRefund {
    pub fn new<S: Into<String>>(payment_intent: S) -> Self {
        Self { payment_intent: payment_intent.into(), metadata: Metadata::new() }
    }

    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub(crate) fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("payment_intent".to_string(), self.payment_intent.clone())];
        params.extend(metadata_params(&self.metadata));
        params
    }
}

fn metadata_params(metadata: &Metadata) -> impl Iterator<Item = (String, String)> + '_ {
    metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
}
