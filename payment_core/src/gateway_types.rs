//! Engine-side views of the remote payment gateway's wire vocabulary.
//!
//! The gateway client normalizes every provider response into [`GatewayResponse`] before it crosses into the engine.
//! Raw provider JSON never reaches the state machine or the orchestrator; the only place it survives is as opaque
//! transaction metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db_types::{MinorUnits, OrderId};

//--------------------------------------   GatewayResponse    --------------------------------------------------------
/// The single normalized shape for all four gateway operations (charge, status, cancel, refund).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub transaction_id: String,
    pub order_id: OrderId,
    pub status_code: String,
    pub status_message: String,
    pub payment_type: Option<String>,
    /// The gateway's status vocabulary, e.g. "capture", "settlement", "deny". Mapped to an internal status by the
    /// state machine; never interpreted anywhere else.
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub redirect_url: Option<String>,
    pub token: Option<String>,
    pub gross_amount: MinorUnits,
}

impl GatewayResponse {
    /// The raw response as a metadata entry, keyed for append-only storage on the transaction.
    pub fn as_metadata(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

//--------------------------------------  WebhookNotification -------------------------------------------------------
/// An inbound gateway status callback, exactly as POSTed to the webhook endpoint. Transient: it is verified,
/// applied or rejected, and discarded; only the metadata it contributes outlives the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub order_id: OrderId,
    pub status_code: String,
    /// Decimal string, e.g. "50000.00". The signature is computed over this exact string, so it is kept verbatim.
    pub gross_amount: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_type: String,
    pub transaction_id: String,
    pub signature_key: String,
}

impl WebhookNotification {
    /// The notification as a metadata entry, with the signature redacted.
    pub fn as_metadata(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = v.as_object_mut() {
            obj.remove("signature_key");
        }
        v
    }
}

//--------------------------------------    ChargeRequest     --------------------------------------------------------
/// Everything the gateway needs to create a charge. Built by the orchestrator, serialized by the gateway client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub gross_amount: MinorUnits,
    pub currency: String,
    pub customer: CustomerDetails,
    pub items: Vec<ChargeItem>,
    /// Restricts the payment method list offered by the gateway, when supplied.
    pub payment_method_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeItem {
    pub id: String,
    pub name: String,
    pub price: MinorUnits,
    pub quantity: i64,
}
