//! `SqliteDatabase` is a concrete implementation of a payment core backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`TransactionStore`] trait. The low-level query
//! functions live in the [`db`](super::db) module; this struct owns the pool and decides transaction scope.
use std::fmt::Debug;

use serde_json::Value;
use sqlx::SqlitePool;

use super::db::{invoices, new_pool, transactions};
use crate::{
    db_types::{
        Invoice,
        MinorUnits,
        NewInvoice,
        NewTransaction,
        OrderId,
        PaymentMethod,
        Transaction,
        TransactionStatus,
    },
    traits::{PaymentStoreError, TransactionStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool for the given URL and returns the database handle.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentStoreError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl TransactionStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::insert_transaction(transaction, &mut conn).await
    }

    async fn fetch_transaction_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Transaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction_by_order_id(order_id, &mut conn).await?;
        Ok(tx)
    }

    async fn update_status_with_guard(
        &self,
        id: i64,
        expected: TransactionStatus,
        new_status: TransactionStatus,
        metadata_patch: Value,
    ) -> Result<Option<Transaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::update_status_with_guard(id, expected, new_status, metadata_patch, &mut conn).await
    }

    async fn append_metadata(&self, id: i64, patch: Value) -> Result<Transaction, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::append_metadata(id, patch, &mut conn).await
    }

    async fn update_refund_total_with_guard(
        &self,
        id: i64,
        expected_total: MinorUnits,
        patch: Value,
    ) -> Result<Option<Transaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::update_refund_total_with_guard(id, expected_total.value(), patch, &mut conn).await
    }

    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        invoices::insert_invoice(invoice, &mut conn).await
    }

    async fn latest_invoice_number_for_prefix(&self, prefix: &str) -> Result<Option<String>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let number = invoices::latest_number_for_prefix(prefix, &mut conn).await?;
        Ok(number)
    }

    async fn fetch_invoice_by_transaction_id(
        &self,
        transaction_id: i64,
    ) -> Result<Option<Invoice>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_by_transaction_id(transaction_id, &mut conn).await?;
        Ok(invoice)
    }

    async fn record_payment_method(
        &self,
        id: i64,
        method: &PaymentMethod,
    ) -> Result<Transaction, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        transactions::record_payment_method(id, method, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
