use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::*;
use pay_common::MinorUnits;
use payment_core::{
    db_types::OrderId,
    gateway_types::{ChargeRequest, GatewayResponse},
    traits::{GatewayError, PaymentGateway},
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::GatewayConfig,
    data_objects::{RawChargePayload, RawGatewayResponse},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(3);
        // Basic auth with the server key as username and an empty password
        let credentials = BASE64.encode(format!("{}:", config.server_key.reveal()));
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::RequestError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::ResponseError(e.to_string()))?;
            Err(GatewayError::QueryError { status, message })
        }
    }

    /// Runs a gateway call that answers with a transaction body. The gateway reports application failures inside a
    /// 2xx HTTP response, so the body's own status code is checked before normalization.
    async fn transaction_query<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<GatewayResponse, GatewayError> {
        let raw = self.rest_query::<RawGatewayResponse, B>(method, path, body).await?;
        let status = raw.numeric_status();
        if status >= 400 {
            debug!("Gateway rejected the call to {path}: {status} {}", raw.status_message);
            return Err(GatewayError::QueryError { status, message: raw.status_message });
        }
        raw.normalize()
    }
}

impl PaymentGateway for GatewayApi {
    async fn create_transaction(&self, charge: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let payload = RawChargePayload::new(charge, &self.config);
        debug!("Submitting charge for {}", charge.order_id);
        let response = self.transaction_query(Method::POST, "/v2/charge", Some(payload)).await?;
        info!("Charge for {} accepted as '{}'", charge.order_id, response.transaction_status);
        Ok(response)
    }

    async fn get_status(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/v2/{}/status", order_id.as_str());
        debug!("Querying gateway status for {order_id}");
        self.transaction_query::<()>(Method::GET, &path, None).await
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/v2/{}/cancel", order_id.as_str());
        debug!("Cancelling {order_id} on the gateway");
        let response = self.transaction_query::<()>(Method::POST, &path, None).await?;
        info!("Cancelled {order_id}. Gateway says '{}'", response.transaction_status);
        Ok(response)
    }

    async fn refund(&self, order_id: &OrderId, amount: Option<MinorUnits>) -> Result<GatewayResponse, GatewayError> {
        let path = format!("/v2/{}/refund", order_id.as_str());
        let body = amount.map(|amount| serde_json::json!({ "amount": amount.value() }));
        debug!("Refunding {order_id} ({})", amount.map(|a| a.to_string()).unwrap_or_else(|| "full amount".to_string()));
        let response = self.transaction_query::<Value>(Method::POST, &path, body).await?;
        info!("Refunded {order_id}. Gateway says '{}'", response.transaction_status);
        Ok(response)
    }
}
