//! Raw wire shapes for the gateway's REST API.
//!
//! These mirror the provider's JSON exactly and exist only inside this crate; [`RawGatewayResponse::normalize`] is
//! the boundary where they become the engine's `GatewayResponse`.

use payment_core::{
    db_types::OrderId,
    gateway_types::{ChargeRequest, GatewayResponse},
    traits::GatewayError,
};
use serde::{Deserialize, Serialize};

use crate::{config::GatewayConfig, helpers::parse_gross_amount};

//--------------------------------------  RawGatewayResponse  --------------------------------------------------------
/// A gateway API response body. The gateway reports application-level failures with a 2xx HTTP status and a 4xx
/// `status_code` field, so `status_code` is the field to trust, not the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGatewayResponse {
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub gross_amount: Option<String>,
    pub currency: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_time: Option<String>,
    pub transaction_status: Option<String>,
    pub fraud_status: Option<String>,
    pub redirect_url: Option<String>,
    pub token: Option<String>,
}

impl RawGatewayResponse {
    /// The application-level status code as a number. The gateway always sends numeric strings here; anything else
    /// is treated as a server error.
    pub fn numeric_status(&self) -> u16 {
        self.status_code.parse().unwrap_or(500)
    }

    /// Converts the raw body into the engine's normalized response. Transaction-bearing fields are mandatory; a
    /// body without them is a malformed response, not a default.
    pub fn normalize(self) -> Result<GatewayResponse, GatewayError> {
        let order_id = self
            .order_id
            .ok_or_else(|| GatewayError::ResponseError("Gateway response is missing order_id".to_string()))?;
        let transaction_status = self.transaction_status.ok_or_else(|| {
            GatewayError::ResponseError(format!("Gateway response for {order_id} is missing transaction_status"))
        })?;
        let gross_amount = self
            .gross_amount
            .as_deref()
            .map(parse_gross_amount)
            .transpose()?
            .unwrap_or_default();
        Ok(GatewayResponse {
            transaction_id: self.transaction_id.unwrap_or_default(),
            order_id: OrderId::from(order_id),
            status_code: self.status_code,
            status_message: self.status_message,
            payment_type: self.payment_type,
            transaction_status,
            fraud_status: self.fraud_status,
            redirect_url: self.redirect_url,
            token: self.token,
            gross_amount,
        })
    }
}

//--------------------------------------   RawChargePayload   --------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct RawChargePayload {
    pub transaction_details: TransactionDetails,
    pub item_details: Vec<ItemDetail>,
    pub customer_details: CustomerDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_payments: Option<Vec<String>>,
    pub expiry: Expiry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callbacks: Option<Callbacks>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetails {
    pub order_id: String,
    pub gross_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Expiry {
    pub unit: String,
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Callbacks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unfinish: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawChargePayload {
    /// Builds the charge body the gateway expects from the engine's charge request plus client configuration.
    /// Charges are given a 60 minute expiry window.
    pub fn new(charge: &ChargeRequest, config: &GatewayConfig) -> Self {
        let item_details = charge
            .items
            .iter()
            .map(|item| ItemDetail {
                id: item.id.clone(),
                price: item.price.value(),
                quantity: item.quantity,
                name: item.name.clone(),
            })
            .collect();
        let customer_details = CustomerDetail {
            first_name: charge.customer.first_name.clone(),
            last_name: charge.customer.last_name.clone(),
            email: charge.customer.email.clone(),
            phone: charge.customer.phone.clone(),
        };
        // a hint from the caller narrows the configured method list to just that method
        let enabled_payments = match &charge.payment_method_hint {
            Some(hint) => Some(vec![hint.clone()]),
            None if config.enabled_payments.is_empty() => None,
            None => Some(config.enabled_payments.clone()),
        };
        let callbacks = if config.finish_url.is_none() && config.unfinish_url.is_none() && config.error_url.is_none()
        {
            None
        } else {
            Some(Callbacks {
                finish: config.finish_url.clone(),
                unfinish: config.unfinish_url.clone(),
                error: config.error_url.clone(),
            })
        };
        Self {
            transaction_details: TransactionDetails {
                order_id: charge.order_id.as_str().to_string(),
                gross_amount: charge.gross_amount.value(),
                currency: charge.currency.clone(),
            },
            item_details,
            customer_details,
            enabled_payments,
            expiry: Expiry { unit: "minutes".to_string(), duration: 60 },
            callbacks,
        }
    }
}
