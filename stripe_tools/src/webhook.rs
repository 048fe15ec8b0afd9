//! Verification and parsing of signed Stripe webhook deliveries.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends the result in the `Stripe-Signature` header
//! as `t=<timestamp>,v1=<hex signature>[,v1=...]`. Several `v1` entries may be present while a signing secret is
//! being rolled; any one of them matching is sufficient.
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::{PaymentIntent, Refund, WebhookError};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    RefundCreated,
    Unhandled(String),
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentFailed,
            "refund.created" => Self::RefundCreated,
            other => Self::Unhandled(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

impl WebhookEvent {
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event_type.as_str())
    }

    /// The event's object as a payment intent. Only meaningful for `payment_intent.*` events.
    pub fn payment_intent(&self) -> Result<PaymentIntent, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::InvalidPayload(format!("Event {} is not a payment intent. {e}", self.id)))
    }

    /// The event's object as a refund. Only meaningful for `refund.*` events.
    pub fn refund(&self) -> Result<Refund, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::InvalidPayload(format!("Event {} is not a refund. {e}", self.id)))
    }
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => {
                let t = t.parse::<i64>().map_err(|e| WebhookError::MalformedHeader(format!("bad timestamp. {e}")))?;
                timestamp = Some(t);
            },
            Some(("v1", sig)) => signatures.push(sig),
            // v0 and any future schemes are ignored
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| WebhookError::MalformedHeader("no timestamp".into()))?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader("no v1 signature".into()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

fn signer(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks the signature header against the raw request body, using the current time for the tolerance check.
pub fn verify_header(payload: &[u8], header: &str, secret: &str, tolerance_secs: i64) -> Result<(), WebhookError> {
    verify_header_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

pub fn verify_header_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let header = parse_header(header)?;
    let mac = signer(payload, secret, header.timestamp)?;
    let matched = header.signatures.iter().any(|sig| match hex::decode(sig) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });
    if !matched {
        debug!("🔏️ Webhook signature did not match any of {} candidates", header.signatures.len());
        return Err(WebhookError::SignatureMismatch);
    }
    if tolerance_secs > 0 && (now - header.timestamp).abs() > tolerance_secs {
        return Err(WebhookError::TimestampOutOfTolerance(tolerance_secs));
    }
    Ok(())
}

/// Verifies the delivery and parses the event in one step.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<WebhookEvent, WebhookError> {
    verify_header(payload, header, secret, tolerance_secs)?;
    WebhookEvent::from_slice(payload)
}

/// Produces a `Stripe-Signature` header value for the payload, as Stripe itself would.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let mac = signer(payload, secret, timestamp)?;
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={sig}"))
}
