use log::*;
use pay_common::Secret;
use serde_json::json;

use crate::{
    api::{
        apply::{apply_status, ApplyVerdict},
        InvoiceApi,
        PaymentFlowError,
    },
    db_types::{Invoice, PaymentMethod, Transaction, TransactionStatus},
    events::{EventProducers, PaymentSettledEvent},
    gateway_types::WebhookNotification,
    helpers::webhook_signature,
    state_machine::map_gateway_status,
    traits::TransactionStore,
};

/// The result of a successfully handled webhook delivery.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// The notification moved the transaction to a new status. An invoice is present iff that status is `Success`.
    Applied { transaction: Transaction, invoice: Option<Invoice> },
    /// The notification was a retransmission; it was recorded in metadata and nothing else changed.
    Duplicate { transaction: Transaction },
}

impl WebhookOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            WebhookOutcome::Applied { transaction, .. } => transaction,
            WebhookOutcome::Duplicate { transaction } => transaction,
        }
    }
}

/// `WebhookApi` verifies, deduplicates and applies inbound gateway status callbacks.
///
/// The gateway delivers callbacks at least once and in no particular order; this handler is safe to invoke any
/// number of times with the same payload. Signature verification happens before any state is read or written.
pub struct WebhookApi<B> {
    db: B,
    server_key: Secret<String>,
    invoices: InvoiceApi<B>,
    producers: EventProducers,
}

impl<B: Clone> WebhookApi<B> {
    pub fn new(db: B, server_key: Secret<String>, producers: EventProducers) -> Self {
        let invoices = InvoiceApi::new(db.clone());
        Self { db, server_key, invoices, producers }
    }
}

impl<B> WebhookApi<B>
where B: TransactionStore
{
    /// Handles one raw webhook delivery.
    ///
    /// 1. Parse the payload into a [`WebhookNotification`].
    /// 2. Verify the signature. On failure, reject without touching any state.
    /// 3. Look up the transaction by order id; unknown orders are an error.
    /// 4. Map the gateway status and apply it through the state machine: duplicates record the notification and
    ///    stop, illegal transitions are rejected, legal ones are applied with the store's conditional update.
    /// 5. On transition into `Success`, generate the invoice (idempotently) and publish the settlement event.
    pub async fn handle(&self, payload: &str) -> Result<WebhookOutcome, PaymentFlowError> {
        let notification: WebhookNotification = serde_json::from_str(payload).map_err(|e| {
            warn!("📨️ Discarding webhook payload that could not be parsed. {e}");
            PaymentFlowError::MalformedPayload(e.to_string())
        })?;
        trace!("📨️ Webhook received for {}: {}", notification.order_id, notification.transaction_status);
        if !webhook_signature::verify(&notification, self.server_key.reveal()) {
            warn!("📨️ Webhook signature verification failed for {}. Rejecting.", notification.order_id);
            return Err(PaymentFlowError::InvalidSignature(notification.order_id));
        }
        let transaction = self
            .db
            .fetch_transaction_by_order_id(&notification.order_id)
            .await?
            .ok_or_else(|| {
                warn!("📨️ Webhook references unknown order {}. Rejecting.", notification.order_id);
                PaymentFlowError::TransactionNotFound(notification.order_id.clone())
            })?;
        let new_status = map_gateway_status(&notification.transaction_status);
        let mut patch = json!({ "last_notification": notification.as_metadata() });
        if let Some(fraud) = &notification.fraud_status {
            patch["fraud_status"] = json!(fraud);
        }
        match apply_status(&self.db, transaction, new_status, patch).await? {
            ApplyVerdict::Duplicate(transaction) => {
                debug!("📨️ Webhook for {} was a duplicate delivery", transaction.order_id);
                Ok(WebhookOutcome::Duplicate { transaction })
            },
            ApplyVerdict::Applied(transaction) => {
                let transaction = if notification.payment_type.is_empty() {
                    transaction
                } else {
                    let method = PaymentMethod::from_payment_type(&notification.payment_type);
                    self.db.record_payment_method(transaction.id, &method).await?
                };
                let invoice = if transaction.status == TransactionStatus::Success {
                    let invoice = self.invoices.generate(&transaction).await?;
                    self.publish_settled(&transaction, &invoice).await;
                    Some(invoice)
                } else {
                    None
                };
                Ok(WebhookOutcome::Applied { transaction, invoice })
            },
        }
    }

    async fn publish_settled(&self, transaction: &Transaction, invoice: &Invoice) {
        for producer in &self.producers.payment_settled_producer {
            debug!("📨️ Notifying settlement hook subscribers for {}", transaction.order_id);
            let event = PaymentSettledEvent::new(transaction.clone(), invoice.clone());
            producer.publish_event(event).await;
        }
    }
}
