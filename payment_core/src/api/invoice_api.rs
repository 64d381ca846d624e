use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::PaymentFlowError,
    db_types::{Invoice, InvoiceItem, NewInvoice, Transaction},
    helpers::invoice_number,
    traits::{PaymentStoreError, TransactionStore},
};

/// How many times a lost invoice-number race is retried before giving up. Each retry re-reads the latest number, so
/// a loss requires another generator to have claimed the number in the window between scan and insert.
const NUMBER_RACE_RETRIES: u32 = 5;

/// `InvoiceApi` turns a settled transaction into an invoice, exactly once.
///
/// Generation is idempotent: if the transaction already has an invoice, that invoice is returned unchanged. Invoice
/// numbers are month-scoped sequences derived from the highest existing number; the UNIQUE constraint on the number
/// plus bounded retry makes concurrent generation gap-free and collision-free.
pub struct InvoiceApi<B> {
    db: B,
}

impl<B> InvoiceApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InvoiceApi<B>
where B: TransactionStore
{
    /// Generates the invoice for a settled transaction, or returns the existing one.
    ///
    /// * Amount = the transaction amount; tax = 11% of it, rounded; total = amount + tax.
    /// * Due 30 days from generation.
    /// * One default line item describing the underlying service, quantity 1, unit price = amount.
    pub async fn generate(&self, transaction: &Transaction) -> Result<Invoice, PaymentFlowError> {
        if let Some(existing) = self.db.fetch_invoice_by_transaction_id(transaction.id).await? {
            debug!(
                "🧾️ Transaction {} already has invoice {}. Returning it unchanged.",
                transaction.order_id, existing.invoice_number
            );
            return Ok(existing);
        }
        let now = Utc::now();
        let prefix = invoice_number::prefix_for(now);
        let amount = transaction.amount;
        let tax = amount.tax_at_11_percent();
        let item = InvoiceItem::new(format!("Payment for order {}", transaction.order_id.as_str()), 1, amount);
        let mut last_collision = None;
        for attempt in 0..NUMBER_RACE_RETRIES {
            let latest = self.db.latest_invoice_number_for_prefix(&prefix).await?;
            let number = invoice_number::next_for_prefix(&prefix, latest.as_deref());
            let invoice = NewInvoice {
                invoice_number: number.clone(),
                user_id: transaction.user_id.clone(),
                transaction_id: transaction.id,
                amount,
                tax,
                total: amount + tax,
                due_date: now + Duration::days(30),
                items: vec![item.clone()],
            };
            match self.db.create_invoice(invoice).await {
                Ok(invoice) => {
                    info!(
                        "🧾️ Invoice {} generated for transaction {} (total {})",
                        invoice.invoice_number, transaction.order_id, invoice.total
                    );
                    return Ok(invoice);
                },
                Err(PaymentStoreError::DuplicateInvoiceForTransaction(_)) => {
                    // lost the race to another generator for the same transaction; its invoice is ours to return
                    debug!("🧾️ Invoice for transaction {} was generated concurrently", transaction.order_id);
                    let existing = self.db.fetch_invoice_by_transaction_id(transaction.id).await?.ok_or(
                        PaymentStoreError::DuplicateInvoiceForTransaction(transaction.id),
                    )?;
                    return Ok(existing);
                },
                Err(PaymentStoreError::InvoiceNumberCollision(n)) => {
                    debug!("🧾️ Invoice number {n} was claimed concurrently (attempt {attempt}). Re-deriving.");
                    last_collision = Some(PaymentStoreError::InvoiceNumberCollision(n));
                },
                Err(e) => return Err(e.into()),
            }
        }
        warn!("🧾️ Gave up generating an invoice for {} after {NUMBER_RACE_RETRIES} attempts", transaction.order_id);
        Err(last_collision.unwrap_or(PaymentStoreError::DatabaseError("invoice number race".to_string())).into())
    }
}
