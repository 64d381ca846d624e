//! HTTP client for the remote payment gateway.
//!
//! [`GatewayApi`] implements the engine's [`PaymentGateway`](payment_core::traits::PaymentGateway) trait over the
//! gateway's REST API, authenticating with HTTP Basic auth derived from the merchant server key. Raw wire shapes
//! live in the `data_objects` module; everything is normalized into the engine's `GatewayResponse` before leaving
//! this crate.
mod api;
mod config;
mod helpers;

mod data_objects;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{RawChargePayload, RawGatewayResponse};
pub use helpers::{format_gross_amount, parse_gross_amount};
