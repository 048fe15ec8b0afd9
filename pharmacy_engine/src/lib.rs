//! Pharmacy Engine
//!
//! The pharmacy engine takes customer and doctor orders for medicines through their whole life: placement, card or
//! offline payment, fulfilment, rejection, cancellation and refunds. It is independent of the HTTP layer and of the
//! particular card processor and messaging services in use.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). Backends implement the traits in [`mod@traits`]; the data types
//!    they store are defined in [`mod@db_types`] and are public. Every state change is a single guarded write, so
//!    concurrent webhook deliveries, browser returns and staff actions can never apply the same transition twice.
//! 2. The public API ([`OrderFlowApi`] and [`OrdersApi`]). This is where the business rules live: who may do what,
//!    delivery pricing ([`mod@pricing`]), prescription checks and notifications.
//! 3. Events ([`mod@events`]). Every committed change is published so that you can hook into it, e.g. to push live
//!    updates to a staff dashboard.
mod pe_api;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use pe_api::{
    errors::OrderFlowError,
    notifications,
    order_flow_api::OrderFlowApi,
    order_objects,
    orders_api::OrdersApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{CatalogManagement, Notifier, OrderManagement, PaymentProcessor, PharmacyDatabase};
