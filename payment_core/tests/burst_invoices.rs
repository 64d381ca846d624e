use std::collections::HashSet;

use log::*;
use payment_core::{
    db_types::{InvoiceItem, MinorUnits, NewInvoice, NewTransaction, OrderId, TransactionStatus},
    helpers::invoice_number,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    InvoiceApi,
    SqliteDatabase,
    TransactionStore,
};
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;

const CONCURRENT_GENERATORS: usize = 4;

async fn settled_transaction(db: &SqliteDatabase, order_id: &str) -> payment_core::db_types::Transaction {
    let new_tx = NewTransaction::new(OrderId::from(order_id), "burst-user".to_string(), MinorUnits::from(10_000), "IDR".to_string());
    let tx = db.create_transaction(new_tx).await.expect("Error creating transaction");
    db.update_status_with_guard(tx.id, TransactionStatus::Pending, TransactionStatus::Success, json!({}))
        .await
        .expect("Error settling transaction")
        .expect("guard must hold, nothing else is running")
}

#[test]
fn concurrent_generators_never_reuse_a_number() {
    info!("🚀️ Starting invoice burst test");
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");

        let mut transactions = Vec::new();
        for i in 0..CONCURRENT_GENERATORS {
            transactions.push(settled_transaction(&db, &format!("burst-{i}")).await);
        }

        let mut handles = Vec::new();
        for tx in transactions {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                let api = InvoiceApi::new(db);
                api.generate(&tx).await.expect("Error generating invoice")
            }));
        }
        let mut numbers = HashSet::new();
        for handle in handles {
            let invoice = handle.await.expect("generator task panicked");
            assert_eq!(invoice.total, MinorUnits::from(11_100));
            numbers.insert(invoice.invoice_number);
        }
        assert_eq!(numbers.len(), CONCURRENT_GENERATORS, "every invoice number must be distinct");

        // the sequence continues monotonically once the burst settles
        let prefix = invoice_number::prefix_for(chrono::Utc::now());
        for i in 1..=CONCURRENT_GENERATORS {
            assert!(numbers.contains(&format!("{prefix}{i:04}")), "missing sequence number {i}");
        }
        let tx = settled_transaction(&db, "burst-last").await;
        let api = InvoiceApi::new(db.clone());
        let invoice = api.generate(&tx).await.expect("Error generating invoice");
        assert_eq!(invoice.invoice_number, format!("{prefix}{:04}", CONCURRENT_GENERATORS + 1));

        let mut db = db;
        db.close().await.expect("Error closing database");
        Sqlite::drop_database(&url).await.unwrap();
    });
    info!("🚀️ test complete");
}

#[test]
fn numbering_crosses_the_9999_boundary() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let prefix = invoice_number::prefix_for(chrono::Utc::now());

        // a month that is already 10_000 invoices deep
        for seq in ["9999", "10000"] {
            let tx = settled_transaction(&db, &format!("deep-{seq}")).await;
            let invoice = NewInvoice {
                invoice_number: format!("{prefix}{seq}"),
                user_id: tx.user_id.clone(),
                transaction_id: tx.id,
                amount: tx.amount,
                tax: tx.amount.tax_at_11_percent(),
                total: tx.amount + tx.amount.tax_at_11_percent(),
                due_date: chrono::Utc::now() + chrono::Duration::days(30),
                items: vec![InvoiceItem::new("Payment", 1, tx.amount)],
            };
            db.create_invoice(invoice).await.expect("Error inserting invoice");
        }

        // the five digit sequence must rank above 9999 in the scan, so the next number is 10001, not a collision
        let tx = settled_transaction(&db, "deep-next").await;
        let api = InvoiceApi::new(db.clone());
        let invoice = api.generate(&tx).await.expect("Error generating invoice");
        assert_eq!(invoice.invoice_number, format!("{prefix}10001"));

        let mut db = db;
        db.close().await.expect("Error closing database");
        Sqlite::drop_database(&url).await.unwrap();
    });
}

#[test]
fn generation_is_idempotent_even_when_racing_itself() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let tx = settled_transaction(&db, "solo").await;

        let mut handles = Vec::new();
        for _ in 0..CONCURRENT_GENERATORS {
            let db = db.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let api = InvoiceApi::new(db);
                api.generate(&tx).await.expect("Error generating invoice")
            }));
        }
        let mut numbers = HashSet::new();
        for handle in handles {
            numbers.insert(handle.await.expect("generator task panicked").invoice_number);
        }
        assert_eq!(numbers.len(), 1, "one transaction, one invoice, no matter how many generators race");

        let mut db = db;
        db.close().await.expect("Error closing database");
        Sqlite::drop_database(&url).await.unwrap();
    });
}
