//! The seams of the payment core.
//!
//! [`TransactionStore`] is implemented by persistence backends (SQLite ships in this crate), and [`PaymentGateway`]
//! by clients for the remote provider. The flow APIs are generic over both, which is also what makes them testable
//! with mocked collaborators.

mod payment_gateway;
mod transaction_store;

pub use payment_gateway::{GatewayError, PaymentGateway};
pub use transaction_store::{PaymentStoreError, TransactionStore};
