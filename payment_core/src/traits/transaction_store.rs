use serde_json::Value;
use thiserror::Error;

use crate::db_types::{
    Invoice,
    MinorUnits,
    NewInvoice,
    NewTransaction,
    OrderId,
    PaymentMethod,
    Transaction,
    TransactionStatus,
};

/// Persistence contract for transaction and invoice records.
///
/// Three of these operations carry the concurrency guarantees the payment flows depend on:
/// * [`update_status_with_guard`](TransactionStore::update_status_with_guard) is a single conditional update, so an
///   interleaved delivery for the same order cannot apply a stale transition.
/// * [`update_refund_total_with_guard`](TransactionStore::update_refund_total_with_guard) is the same guard over
///   the cumulative refunded total, so two racing refunds cannot both claim the same remainder.
/// * [`create_invoice`](TransactionStore::create_invoice) enforces uniqueness of both the invoice number and the
///   transaction id, which is what makes concurrent invoice generation collision-free.
#[allow(async_fn_in_trait)]
pub trait TransactionStore: Clone + Send + Sync {
    /// The URL of the backing database
    fn url(&self) -> &str;

    /// Inserts a new transaction with `Pending` status and empty metadata.
    ///
    /// `order_id` is unique across all transactions; inserting a second transaction with the same order id fails
    /// with [`PaymentStoreError::DuplicateOrderId`].
    async fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, PaymentStoreError>;

    /// Fetches the transaction with the given order id, or `None`.
    async fn fetch_transaction_by_order_id(&self, order_id: &OrderId)
        -> Result<Option<Transaction>, PaymentStoreError>;

    /// Atomically moves the transaction from `expected` to `new_status` and merges `metadata_patch` into its
    /// metadata, as a single conditional update (`... WHERE id = ? AND status = ?`).
    ///
    /// Returns the updated record, or `None` if the precondition failed because a concurrent writer already moved
    /// the transaction. Callers must treat `None` as "re-read and re-evaluate", never as success.
    async fn update_status_with_guard(
        &self,
        id: i64,
        expected: TransactionStatus,
        new_status: TransactionStatus,
        metadata_patch: Value,
    ) -> Result<Option<Transaction>, PaymentStoreError>;

    /// Merges `patch` into the transaction's metadata without touching its status. Metadata is append-only: keys are
    /// added or overwritten, never removed.
    async fn append_metadata(&self, id: i64, patch: Value) -> Result<Transaction, PaymentStoreError>;

    /// Merges `patch` into the transaction's metadata only if the cumulative refunded total (the `refunded_total`
    /// metadata key, 0 when absent) still equals `expected_total`. Same optimistic-guard contract as
    /// [`update_status_with_guard`](TransactionStore::update_status_with_guard): `None` means a concurrent refund
    /// moved the total first, and the caller must re-read and re-evaluate its bound.
    async fn update_refund_total_with_guard(
        &self,
        id: i64,
        expected_total: MinorUnits,
        patch: Value,
    ) -> Result<Option<Transaction>, PaymentStoreError>;

    /// Records the payment method descriptor the gateway reported. The first report wins; later calls are no-ops.
    async fn record_payment_method(&self, id: i64, method: &PaymentMethod)
        -> Result<Transaction, PaymentStoreError>;

    /// Inserts a new invoice together with its line items.
    ///
    /// Fails with [`PaymentStoreError::DuplicateInvoiceForTransaction`] if the transaction already has an invoice,
    /// and with [`PaymentStoreError::InvoiceNumberCollision`] if the number was taken by a concurrent writer (the
    /// caller re-derives the number and retries).
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, PaymentStoreError>;

    /// The highest invoice number starting with `prefix`, or `None` if the month is empty. Numbers are ordered by
    /// length first, then lexicographically, so a sequence that has grown past 9999 still ranks highest.
    async fn latest_invoice_number_for_prefix(&self, prefix: &str) -> Result<Option<String>, PaymentStoreError>;

    /// Fetches the invoice generated for the given transaction, or `None`.
    async fn fetch_invoice_by_transaction_id(&self, transaction_id: i64)
        -> Result<Option<Invoice>, PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("Cannot insert transaction, since one already exists with order id {0}")]
    DuplicateOrderId(OrderId),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(OrderId),
    #[error("The requested transaction (internal id {0}) does not exist")]
    TransactionIdNotFound(i64),
    #[error("Transaction {0} already has an invoice")]
    DuplicateInvoiceForTransaction(i64),
    #[error("Invoice number {0} is already taken")]
    InvoiceNumberCollision(String),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
