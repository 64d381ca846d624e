use std::fmt::Display;

use payment_core::{
    db_types::{Transaction, TransactionStatus},
    gateway_types::GatewayResponse,
    ProcessPaymentResult,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body for `/payments/{order_id}/refund`. Omitting `amount` refunds the un-refunded remainder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub amount: Option<i64>,
}

/// What the caller of a payment endpoint gets back: the local view of the transaction, plus whatever the client UI
/// needs to send the customer off to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order_id: String,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<String>,
}

impl PaymentResult {
    pub fn new(transaction: &Transaction, response: Option<&GatewayResponse>) -> Self {
        Self {
            order_id: transaction.order_id.as_str().to_string(),
            status: transaction.status,
            amount: transaction.amount.value(),
            currency: transaction.currency.clone(),
            redirect_url: response.and_then(|r| r.redirect_url.clone()),
            token: response.and_then(|r| r.token.clone()),
            gateway_status: response.map(|r| r.transaction_status.clone()),
        }
    }
}

impl From<ProcessPaymentResult> for PaymentResult {
    fn from(result: ProcessPaymentResult) -> Self {
        Self::new(&result.transaction, Some(&result.gateway_response))
    }
}
