//! Payment transaction processing core
//!
//! This library drives payment charges through a bounded state machine: the orchestrator creates a pending
//! transaction and submits the charge to the remote gateway, and asynchronous webhook callbacks (verified,
//! deduplicated, applied idempotently) move the transaction to its terminal status. Settlement produces exactly one
//! invoice per transaction with a monotonic, month-scoped invoice number.
//!
//! The library is divided into three main sections:
//! 1. Database management (the `sqlite` module). SQLite is the supported backend. You should never need to access the
//!    database directly; use the flow APIs instead. The exception is the data types used in the database, which are
//!    defined in the public `db_types` module.
//! 2. The flow APIs ([`PaymentFlowApi`], [`WebhookApi`], [`InvoiceApi`]). These provide the public-facing
//!    functionality of the core. Backends implement the [`TransactionStore`] trait, and gateway clients implement
//!    the [`PaymentGateway`] trait, in order to plug into the flows.
//! 3. Events ([`mod@events`]). When a transaction settles, a `PaymentSettledEvent` is emitted. A simple actor
//!    framework lets downstream concerns (mail, loyalty) hook into settlements without touching the payment flow.
mod api;
mod sqlite;

pub mod db_types;
pub mod events;
pub mod gateway_types;
pub mod helpers;
pub mod state_machine;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{InvoiceApi, PaymentFlowApi, PaymentFlowError, ProcessPaymentResult, WebhookApi, WebhookOutcome};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{PaymentGateway, PaymentStoreError, TransactionStore};
