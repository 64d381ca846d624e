//! # Payment server
//! This module hosts the HTTP surface of the payment gateway core. It is responsible for:
//! Accepting charge, status, cancel and refund requests from authenticated callers.
//! Listening for incoming status webhooks from the payment gateway.
//! Handing everything off to the flow APIs in `payment_core`.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/payments`: Charge creation.
//! * `/api/payments/{order_id}/status`: Local-and-gateway status reconciliation.
//! * `/api/payments/{order_id}/cancel` and `/api/payments/{order_id}/refund`.
//! * `/webhook/payment`: The webhook route for receiving transaction status callbacks from the gateway.

pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
