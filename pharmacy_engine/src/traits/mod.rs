//! # Storage and collaborator contracts
//!
//! The lifecycle controller is generic over these traits so that backends and external services can be swapped out
//! (and faked in tests).
//!
//! * [`OrderManagement`] answers questions about orders, their items, history, codes, payments and prescriptions.
//! * [`CatalogManagement`] looks up the products, people and addresses an order refers to.
//! * [`PharmacyDatabase`] is the mutating side. Every method is a single atomic transaction, and every guard that
//!   decides whether a mutation happens is evaluated inside that transaction.
//! * [`PaymentProcessor`] wraps the card processor: payment intents and refunds.
//! * [`Notifier`] sends emails and text messages.
mod catalog_management;
mod data_objects;
mod notifier;
mod order_management;
mod payment_processor;
mod pharmacy_database;

pub use catalog_management::CatalogManagement;
pub use data_objects::{NewOrderItemRecord, NewOrderRecord, PaymentConfirmation, RefundRecord};
pub use notifier::{EmailMessage, Notification, NotificationError, Notifier, SmsMessage};
pub use order_management::OrderManagement;
pub use payment_processor::{GatewayIntent, GatewayRefund, IntentRequest, PaymentProcessor, PaymentProcessorError, RefundRequest};
pub use pharmacy_database::{PharmacyDatabase, PharmacyDbError};
