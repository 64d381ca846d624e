use thiserror::Error;

use crate::{
    db_types::{MinorUnits, OrderId, TransactionStatus},
    traits::{GatewayError, PaymentStoreError},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentFlowError {
    #[error("{0}")]
    StoreError(#[from] PaymentStoreError),
    #[error("{0}")]
    GatewayError(#[from] GatewayError),
    #[error("Webhook signature verification failed for order {0}")]
    InvalidSignature(OrderId),
    #[error("Webhook payload could not be parsed. {0}")]
    MalformedPayload(String),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(OrderId),
    #[error("Illegal status transition for {order_id}: {from} -> {to}")]
    IllegalTransition { order_id: OrderId, from: TransactionStatus, to: TransactionStatus },
    #[error("Refund of {requested} exceeds the un-refunded remainder of {remaining}")]
    RefundExceedsRemainder { requested: MinorUnits, remaining: MinorUnits },
    #[error("Invalid payment request. {0}")]
    ValidationError(String),
}
