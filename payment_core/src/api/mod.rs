mod apply;
mod errors;
mod invoice_api;
mod payment_flow_api;
mod webhook_api;

pub use errors::PaymentFlowError;
pub use invoice_api::InvoiceApi;
pub use payment_flow_api::{PaymentFlowApi, ProcessPaymentResult};
pub use webhook_api::{WebhookApi, WebhookOutcome};
