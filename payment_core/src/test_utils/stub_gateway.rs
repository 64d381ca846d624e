//! A scripted in-memory [`PaymentGateway`] for driving the payment flow in tests without a network.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::{MinorUnits, OrderId},
    gateway_types::{ChargeRequest, GatewayResponse},
    traits::{GatewayError, PaymentGateway},
};

#[derive(Default)]
struct StubState {
    charge_status: Option<String>,
    status_reply: Option<String>,
    cancel_status: Option<String>,
    refund_status: Option<String>,
    fail_next_refund: bool,
    amounts: HashMap<String, MinorUnits>,
    calls: Vec<String>,
}

/// Answers each gateway operation with a canned transaction status. The defaults mimic a well-behaved gateway:
/// charges come back "pending", cancels "cancel", refunds "refund". Status queries must be scripted explicitly
/// with [`StubGateway::reply_to_status_with`].
#[derive(Clone, Default)]
pub struct StubGateway {
    state: Arc<Mutex<StubState>>,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_to_charge_with(&self, transaction_status: &str) {
        self.state.lock().unwrap().charge_status = Some(transaction_status.to_string());
    }

    pub fn reply_to_status_with(&self, transaction_status: &str) {
        self.state.lock().unwrap().status_reply = Some(transaction_status.to_string());
    }

    pub fn reply_to_refund_with(&self, transaction_status: &str) {
        self.state.lock().unwrap().refund_status = Some(transaction_status.to_string());
    }

    /// Makes the next refund call fail with a timeout.
    pub fn fail_next_refund(&self) {
        self.state.lock().unwrap().fail_next_refund = true;
    }

    /// The operations invoked so far, in order, as "op order_id" strings.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn response(&self, order_id: &OrderId, transaction_status: &str, payment_type: Option<&str>) -> GatewayResponse {
        let amount = self.state.lock().unwrap().amounts.get(order_id.as_str()).copied().unwrap_or_default();
        GatewayResponse {
            transaction_id: format!("stub-{}", order_id.as_str()),
            order_id: order_id.clone(),
            status_code: "200".to_string(),
            status_message: "Success".to_string(),
            payment_type: payment_type.map(String::from),
            transaction_status: transaction_status.to_string(),
            fraud_status: None,
            redirect_url: Some(format!("https://gateway.test/redirect/{}", order_id.as_str())),
            token: Some(format!("token-{}", order_id.as_str())),
            gross_amount: amount,
        }
    }
}

impl PaymentGateway for StubGateway {
    async fn create_transaction(&self, charge: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let status = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("charge {}", charge.order_id.as_str()));
            state.amounts.insert(charge.order_id.as_str().to_string(), charge.gross_amount);
            state.charge_status.clone().unwrap_or_else(|| "pending".to_string())
        };
        Ok(self.response(&charge.order_id, &status, None))
    }

    async fn get_status(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError> {
        let status = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("status {}", order_id.as_str()));
            state.status_reply.clone()
        };
        let status = status.ok_or_else(|| GatewayError::ResponseError("no status scripted".to_string()))?;
        Ok(self.response(order_id, &status, Some("bank_transfer")))
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<GatewayResponse, GatewayError> {
        let status = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("cancel {}", order_id.as_str()));
            state.cancel_status.clone().unwrap_or_else(|| "cancel".to_string())
        };
        Ok(self.response(order_id, &status, None))
    }

    async fn refund(&self, order_id: &OrderId, amount: Option<MinorUnits>) -> Result<GatewayResponse, GatewayError> {
        let status = {
            let mut state = self.state.lock().unwrap();
            let amt = amount.map(|a| a.to_string()).unwrap_or_else(|| "full".to_string());
            state.calls.push(format!("refund {} {amt}", order_id.as_str()));
            if state.fail_next_refund {
                state.fail_next_refund = false;
                return Err(GatewayError::Timeout);
            }
            state.refund_status.clone().unwrap_or_else(|| "refund".to_string())
        };
        Ok(self.response(order_id, &status, None))
    }
}
