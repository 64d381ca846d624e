use log::*;
use pay_common::Secret;
use serde_json::json;

use crate::{
    api::{
        apply::{apply_status, ApplyVerdict},
        InvoiceApi,
        PaymentFlowError,
        WebhookApi,
        WebhookOutcome,
    },
    db_types::{Invoice, MinorUnits, NewTransaction, OrderId, PaymentMethod, Transaction, TransactionStatus},
    events::{EventProducers, PaymentSettledEvent},
    gateway_types::{ChargeRequest, GatewayResponse},
    state_machine::map_gateway_status,
    traits::{PaymentGateway, TransactionStore},
};

/// What the caller gets back from a charge submission: the persisted transaction (already reflecting the gateway's
/// synchronous answer) and the normalized gateway response (which carries the redirect URL / token the client UI
/// needs to complete the payment).
#[derive(Debug)]
pub struct ProcessPaymentResult {
    pub transaction: Transaction,
    pub gateway_response: GatewayResponse,
}

/// `PaymentFlowApi` is the façade for the synchronous payment operations: creating charges, cancelling and
/// refunding them, and reconciling local state against the gateway.
///
/// The asynchronous path (webhook callbacks) is owned by [`WebhookApi`]; `handle_webhook` delegates to it. Both
/// paths apply status changes through the same state machine and the same conditional store update.
///
/// None of these operations retry internally. Gateway and store failures propagate to the caller, which in
/// particular means a charge submission must never be blindly re-issued: the gateway has no idempotency key, and a
/// retry would create a duplicate charge.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    webhooks: WebhookApi<B>,
    invoices: InvoiceApi<B>,
    producers: EventProducers,
}

impl<B: Clone, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, server_key: Secret<String>, producers: EventProducers) -> Self {
        let webhooks = WebhookApi::new(db.clone(), server_key, producers.clone());
        let invoices = InvoiceApi::new(db.clone());
        Self { db, gateway, webhooks, invoices, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    /// Creates a pending transaction for the authenticated user, submits the charge to the gateway, and applies the
    /// gateway's synchronous answer through the state machine.
    ///
    /// Validation failures and duplicate order ids are rejected before the gateway sees anything. If the gateway
    /// call itself fails, the transaction remains `Pending` and the error propagates; a later webhook or status
    /// query can still settle it.
    pub async fn process_payment(
        &self,
        charge: ChargeRequest,
        user_id: &str,
    ) -> Result<ProcessPaymentResult, PaymentFlowError> {
        validate_charge(&charge, user_id)?;
        let new_transaction = NewTransaction::new(
            charge.order_id.clone(),
            user_id.to_string(),
            charge.gross_amount,
            charge.currency.clone(),
        );
        let transaction = self.db.create_transaction(new_transaction).await?;
        debug!("💳️ Transaction {} created for user {user_id}. Submitting charge.", transaction.order_id);
        let response = self.gateway.create_transaction(&charge).await?;
        let (transaction, _invoice) = self.apply_response(transaction, &response).await?;
        info!(
            "💳️ Charge for {} submitted. Gateway says '{}', transaction is {}.",
            transaction.order_id, response.transaction_status, transaction.status
        );
        Ok(ProcessPaymentResult { transaction, gateway_response: response })
    }

    /// Cancels an unsettled charge on the gateway and applies the resulting status.
    pub async fn cancel_payment(&self, order_id: &OrderId) -> Result<Transaction, PaymentFlowError> {
        let transaction = self.fetch_required(order_id).await?;
        debug!("💳️ Cancelling {} (currently {})", order_id, transaction.status);
        let response = self.gateway.cancel(order_id).await?;
        let (transaction, _) = self.apply_response(transaction, &response).await?;
        Ok(transaction)
    }

    /// Refunds a settled charge, fully (no amount) or partially.
    ///
    /// The cumulative refunded amount is tracked in transaction metadata under `refunded_total` and advanced through
    /// the store's conditional update *before* the gateway is called, so two racing refunds cannot both claim the
    /// same remainder. A lost guard re-reads the transaction and re-checks the bound, mirroring the status path; a
    /// gateway failure releases the reservation again.
    pub async fn refund_payment(
        &self,
        order_id: &OrderId,
        amount: Option<MinorUnits>,
    ) -> Result<Transaction, PaymentFlowError> {
        let (transaction, refunded, requested) = loop {
            let transaction = self.fetch_required(order_id).await?;
            if !matches!(transaction.status, TransactionStatus::Success | TransactionStatus::Refund) {
                warn!("💳️ Refusing to refund {} while it is {}", order_id, transaction.status);
                return Err(PaymentFlowError::IllegalTransition {
                    order_id: order_id.clone(),
                    from: transaction.status,
                    to: TransactionStatus::Refund,
                });
            }
            let refunded = transaction.refunded_total();
            let remaining = transaction.amount - refunded;
            let requested = amount.unwrap_or(remaining);
            if !requested.is_positive() || requested > remaining {
                warn!("💳️ Refund of {requested} for {order_id} rejected: {refunded} already refunded of {}", transaction.amount);
                return Err(PaymentFlowError::RefundExceedsRemainder { requested, remaining });
            }
            let new_total = refunded + requested;
            let reservation = json!({ "refunded_total": new_total.value() });
            match self.db.update_refund_total_with_guard(transaction.id, refunded, reservation).await? {
                Some(tx) => break (tx, refunded, requested),
                None => {
                    debug!("💳️ Refund reservation for {order_id} lost a race. Re-reading and re-evaluating.");
                },
            }
        };
        // after a partial refund an omitted amount is sent explicitly, so the gateway refunds the local remainder
        // and not the original total
        let gateway_amount = if amount.is_none() && refunded.is_positive() { Some(requested) } else { amount };
        let response = match self.gateway.refund(order_id, gateway_amount).await {
            Ok(response) => response,
            Err(e) => {
                let release = json!({ "refunded_total": refunded.value() });
                match self.db.update_refund_total_with_guard(transaction.id, refunded + requested, release).await {
                    Ok(Some(_)) => {},
                    Ok(None) => error!("💳️ Refund reservation for {order_id} could not be released: the total moved"),
                    Err(se) => error!("💳️ Refund reservation for {order_id} could not be released: {se}"),
                }
                return Err(e.into());
            },
        };
        let (transaction, _) = self.apply_response(transaction, &response).await?;
        let transaction =
            self.db.append_metadata(transaction.id, json!({ "last_refund_amount": requested.value() })).await?;
        info!("💳️ Refunded {requested} for {order_id}. Cumulative refund is {}.", refunded + requested);
        Ok(transaction)
    }

    /// Pulls the current status from the gateway and reconciles local state if it differs, using the same state
    /// machine rules as the webhook path. An irreconcilable difference (the gateway reporting a status the local
    /// transaction has legally moved past) is logged and the local record returned unchanged.
    pub async fn get_transaction_status(
        &self,
        order_id: &OrderId,
    ) -> Result<(Transaction, GatewayResponse), PaymentFlowError> {
        let transaction = self.fetch_required(order_id).await?;
        let response = self.gateway.get_status(order_id).await?;
        let mapped = map_gateway_status(&response.transaction_status);
        if mapped == transaction.status {
            return Ok((transaction, response));
        }
        debug!("💳️ Reconciling {}: local {} vs gateway '{}'", order_id, transaction.status, response.transaction_status);
        match self.apply_response(transaction, &response).await {
            Ok((transaction, _)) => Ok((transaction, response)),
            Err(PaymentFlowError::IllegalTransition { order_id, from, to }) => {
                warn!("💳️ Gateway reports {to} for {order_id} but local state is {from}. Keeping local state.");
                let transaction = self.fetch_required(&order_id).await?;
                Ok((transaction, response))
            },
            Err(e) => Err(e),
        }
    }

    /// Delegates an inbound webhook delivery to the [`WebhookApi`].
    pub async fn handle_webhook(&self, payload: &str) -> Result<WebhookOutcome, PaymentFlowError> {
        self.webhooks.handle(payload).await
    }

    async fn fetch_required(&self, order_id: &OrderId) -> Result<Transaction, PaymentFlowError> {
        self.db
            .fetch_transaction_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentFlowError::TransactionNotFound(order_id.clone()))
    }

    /// Applies a normalized gateway response to the transaction: status through the state machine, the raw response
    /// and fraud status into metadata, the payment type onto the payment-method descriptor, and the invoice +
    /// settlement event on transition into `Success`.
    async fn apply_response(
        &self,
        transaction: Transaction,
        response: &GatewayResponse,
    ) -> Result<(Transaction, Option<Invoice>), PaymentFlowError> {
        let new_status = map_gateway_status(&response.transaction_status);
        let mut patch = json!({ "gateway_response": response.as_metadata() });
        if let Some(fraud) = &response.fraud_status {
            patch["fraud_status"] = json!(fraud);
        }
        match apply_status(&self.db, transaction, new_status, patch).await? {
            ApplyVerdict::Duplicate(transaction) => Ok((transaction, None)),
            ApplyVerdict::Applied(transaction) => {
                let transaction = match &response.payment_type {
                    Some(payment_type) if !payment_type.is_empty() => {
                        let method = PaymentMethod::from_payment_type(payment_type);
                        self.db.record_payment_method(transaction.id, &method).await?
                    },
                    _ => transaction,
                };
                if transaction.status == TransactionStatus::Success {
                    let invoice = self.invoices.generate(&transaction).await?;
                    self.publish_settled(&transaction, &invoice).await;
                    Ok((transaction, Some(invoice)))
                } else {
                    Ok((transaction, None))
                }
            },
        }
    }

    async fn publish_settled(&self, transaction: &Transaction, invoice: &Invoice) {
        for producer in &self.producers.payment_settled_producer {
            debug!("💳️ Notifying settlement hook subscribers for {}", transaction.order_id);
            let event = PaymentSettledEvent::new(transaction.clone(), invoice.clone());
            producer.publish_event(event).await;
        }
    }
}

fn validate_charge(charge: &ChargeRequest, user_id: &str) -> Result<(), PaymentFlowError> {
    if charge.order_id.as_str().trim().is_empty() {
        return Err(PaymentFlowError::ValidationError("order_id must not be empty".to_string()));
    }
    if user_id.trim().is_empty() {
        return Err(PaymentFlowError::ValidationError("user id must not be empty".to_string()));
    }
    if !charge.gross_amount.is_positive() {
        return Err(PaymentFlowError::ValidationError("gross_amount must be positive".to_string()));
    }
    if charge.currency.trim().is_empty() {
        return Err(PaymentFlowError::ValidationError("currency must not be empty".to_string()));
    }
    if charge.items.is_empty() {
        return Err(PaymentFlowError::ValidationError("at least one item is required".to_string()));
    }
    if charge.customer.email.trim().is_empty() {
        return Err(PaymentFlowError::ValidationError("customer email must not be empty".to_string()));
    }
    Ok(())
}
