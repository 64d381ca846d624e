pub mod invoice_number;
pub mod webhook_signature;
