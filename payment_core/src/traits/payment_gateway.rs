use thiserror::Error;

use crate::{
    db_types::{MinorUnits, OrderId},
    gateway_types::{ChargeRequest, GatewayResponse},
};

/// Client contract for the remote payment gateway.
///
/// All four operations are synchronous network round-trips from the caller's perspective; implementations must not
/// retry internally (re-POSTing a charge without an idempotency key would create duplicate charges), and should
/// impose a request timeout, surfaced as [`GatewayError::Timeout`] so callers can tell a dead gateway from a
/// rejection.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone + Send + Sync {
    /// Submits a charge to the gateway. A non-2xx response is a hard failure carrying the HTTP status and body.
    async fn create_transaction(&self, charge: &ChargeRequest) -> Result<GatewayResponse, GatewayError>;

    /// Queries the gateway for the current status of a charge.
    async fn get_status(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError>;

    /// Cancels an unsettled charge.
    async fn cancel(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError>;

    /// Refunds a settled charge. Omitting `amount` requests a full refund.
    async fn refund(&self, order_id: &OrderId, amount: Option<MinorUnits>) -> Result<GatewayResponse, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid gateway request: {0}")]
    RequestError(String),
    #[error("Invalid gateway response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize gateway JSON: {0}")]
    JsonError(String),
    #[error("Gateway rejected the call. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The gateway did not respond within the request timeout")]
    Timeout,
}

impl GatewayError {
    /// Timeouts are retryable; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout)
    }
}
