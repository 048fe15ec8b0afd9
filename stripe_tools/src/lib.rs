//! A thin client for the parts of the Stripe REST API the pharmacy uses: payment intents, refunds and signed
//! webhook events.
mod api;
mod config;
mod data_objects;
mod error;

pub mod webhook;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{Metadata, NewPaymentIntent, NewRefund, PaymentIntent, Refund, RefundStatus};
pub use error::{StripeApiError, WebhookError};
pub use webhook::{EventKind, WebhookEvent};
