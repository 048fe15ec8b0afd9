//! # Pharmacy engine public API
//!
//! * [`order_flow_api`] drives orders through their lifecycle: placement, payment, fulfilment, rejection,
//!   cancellation and refunds. It is the only API that changes anything.
//! * [`orders_api`] is the read side used by dashboards and the guest payment page.
//!
//! An API instance is created by supplying backends that implement the traits the API needs:
//!
//! ```rust,ignore
//! use pharmacy_engine::{events::EventProducers, OrderFlowApi, OrdersApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/pharmacy.db", 5).await?;
//! let flow = OrderFlowApi::new(db.clone(), stripe, mailer, EventProducers::default());
//! let placed = flow.place_order(&actor, new_order).await?;
//! let details = OrdersApi::new(db).order_details(&actor, &placed.order.order_id).await?;
//! ```
pub mod errors;
pub mod notifications;
pub mod order_flow_api;
pub mod order_objects;
pub mod orders_api;
