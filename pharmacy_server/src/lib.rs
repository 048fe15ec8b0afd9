//! # Pharmacy order server
//! This crate hosts the HTTP surface of the pharmacy order system. It is responsible for:
//! * Accepting orders from customers and doctors, and order actions from pharmacy staff.
//! * The guest payment page: anyone holding an order code can look the order up and pay for it by card.
//! * Listening for signed webhook deliveries from the card processor and reconciling payments and refunds.
//! * Streaming live order updates to staff dashboards.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/pay/{code}`: Guest order lookup, payment intent creation and browser-return confirmation.
//! * `/webhook/payments`: Signed card processor events.
//! * `/api/...`: Order placement, actions and queries for identified users. See [routes](routes/index.html).
//!
//! Identity is established upstream: a trusted proxy forwards the user id and role in request headers
//! (see [`middleware::IdentityMiddlewareFactory`]).

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod live_updates;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
