use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Invoice, NewInvoice},
    traits::PaymentStoreError,
};

/// Inserts a new invoice. Two UNIQUE constraints guard this insert:
/// * `transaction_id`: a second invoice for the same transaction fails with `DuplicateInvoiceForTransaction`;
/// * `invoice_number`: a number race between concurrent generators fails with `InvoiceNumberCollision`, and the
///   caller re-derives the number and retries.
pub async fn insert_invoice(invoice: NewInvoice, conn: &mut SqliteConnection) -> Result<Invoice, PaymentStoreError> {
    let items = serde_json::to_string(&invoice.items)
        .map_err(|e| PaymentStoreError::DatabaseError(e.to_string()))?;
    let result = sqlx::query_as::<_, Invoice>(
        r#"
            INSERT INTO invoices (invoice_number, user_id, transaction_id, amount, tax, total, due_date, items)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(invoice.invoice_number.clone())
    .bind(invoice.user_id)
    .bind(invoice.transaction_id)
    .bind(invoice.amount.value())
    .bind(invoice.tax.value())
    .bind(invoice.total.value())
    .bind(invoice.due_date)
    .bind(items)
    .fetch_one(conn)
    .await;
    match result {
        Ok(inv) => {
            debug!("🗃️ Invoice {} created for transaction {}", inv.invoice_number, inv.transaction_id);
            Ok(inv)
        },
        Err(e) if e.as_database_error().is_some_and(|de| de.is_unique_violation()) => {
            let message = e.as_database_error().map(|de| de.message().to_string()).unwrap_or_default();
            if message.contains("transaction_id") {
                Err(PaymentStoreError::DuplicateInvoiceForTransaction(invoice.transaction_id))
            } else {
                Err(PaymentStoreError::InvoiceNumberCollision(invoice.invoice_number))
            }
        },
        Err(e) => Err(e.into()),
    }
}

/// The highest invoice number with the given year/month prefix, or `None`. Ordering is by length first, then
/// lexicographically, so a five digit sequence like `...10000` ranks above `...9999`.
pub async fn latest_number_for_prefix(
    prefix: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<String>, sqlx::Error> {
    let number: Option<(String,)> = sqlx::query_as(
        "SELECT invoice_number FROM invoices WHERE invoice_number LIKE $1 || '%' \
         ORDER BY length(invoice_number) DESC, invoice_number DESC LIMIT 1",
    )
    .bind(prefix)
    .fetch_optional(conn)
    .await?;
    Ok(number.map(|(n,)| n))
}

/// Returns the invoice generated for the given transaction, if any.
pub async fn fetch_by_transaction_id(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice = sqlx::query_as("SELECT * FROM invoices WHERE transaction_id = $1")
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(invoice)
}
