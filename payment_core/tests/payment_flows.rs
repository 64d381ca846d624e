use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use log::*;
use pay_common::Secret;
use payment_core::{
    db_types::{MinorUnits, OrderId, TransactionStatus},
    events::{EventHandlers, EventHooks, EventProducers},
    gateway_types::{ChargeItem, ChargeRequest, CustomerDetails},
    helpers::webhook_signature,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        stub_gateway::StubGateway,
    },
    PaymentFlowApi,
    PaymentFlowError,
    SqliteDatabase,
    TransactionStore,
    WebhookOutcome,
};
use serde_json::json;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;

const SERVER_KEY: &str = "SB-server-key-for-tests";

async fn setup() -> (PaymentFlowApi<SqliteDatabase, StubGateway>, StubGateway) {
    setup_with_producers(EventProducers::default()).await
}

async fn setup_with_producers(
    producers: EventProducers,
) -> (PaymentFlowApi<SqliteDatabase, StubGateway>, StubGateway) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let gateway = StubGateway::new();
    let api = PaymentFlowApi::new(db, gateway.clone(), Secret::new(SERVER_KEY.to_string()), producers);
    (api, gateway)
}

async fn tear_down(api: PaymentFlowApi<SqliteDatabase, StubGateway>) {
    let mut db = api.db().clone();
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

fn charge(order_id: &str, amount: i64) -> ChargeRequest {
    ChargeRequest {
        order_id: OrderId::from(order_id),
        gross_amount: MinorUnits::from(amount),
        currency: "IDR".to_string(),
        customer: CustomerDetails {
            first_name: "Ayu".to_string(),
            last_name: Some("Lestari".to_string()),
            email: "ayu@example.com".to_string(),
            phone: None,
        },
        items: vec![ChargeItem {
            id: "svc-1".to_string(),
            name: "Premium subscription".to_string(),
            price: MinorUnits::from(amount),
            quantity: 1,
        }],
        payment_method_hint: None,
    }
}

fn webhook_payload(order_id: &str, gross_amount: &str, transaction_status: &str) -> String {
    let signature = webhook_signature::sign(order_id, "200", gross_amount, SERVER_KEY);
    json!({
        "order_id": order_id,
        "status_code": "200",
        "gross_amount": gross_amount,
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "payment_type": "bank_transfer",
        "transaction_id": format!("gw-{order_id}"),
        "signature_key": signature,
    })
    .to_string()
}

#[test]
fn charge_then_settlement_webhook() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (api, _gateway) = setup().await;

        let result = api.process_payment(charge("ORD1", 50_000), "user-1").await.expect("Error processing payment");
        assert_eq!(result.transaction.status, TransactionStatus::Pending);
        assert_eq!(result.transaction.amount, MinorUnits::from(50_000));
        assert!(result.gateway_response.redirect_url.is_some());

        let payload = webhook_payload("ORD1", "50000.00", "settlement");
        let outcome = api.handle_webhook(&payload).await.expect("Error handling webhook");
        let invoice = match outcome {
            WebhookOutcome::Applied { transaction, invoice } => {
                assert_eq!(transaction.status, TransactionStatus::Success);
                let method = transaction.payment_method.expect("payment method not recorded");
                assert_eq!(method.0.method_type, "bank_transfer");
                assert_eq!(transaction.metadata.0["fraud_status"], json!("accept"));
                invoice.expect("settlement must produce an invoice")
            },
            WebhookOutcome::Duplicate { .. } => panic!("first delivery must not be a duplicate"),
        };
        assert_eq!(invoice.amount, MinorUnits::from(50_000));
        assert_eq!(invoice.tax, MinorUnits::from(5_500));
        assert_eq!(invoice.total, MinorUnits::from(55_500));
        assert!(invoice.invoice_number.starts_with("INV"));
        assert!(invoice.invoice_number.ends_with("0001"));
        assert_eq!(invoice.items.0.len(), 1);
        assert_eq!(invoice.items.0[0].quantity, 1);
        assert_eq!(invoice.items.0[0].unit_price, MinorUnits::from(50_000));

        // redelivery of the same notification changes nothing
        let outcome = api.handle_webhook(&payload).await.expect("Error handling duplicate webhook");
        match outcome {
            WebhookOutcome::Duplicate { transaction } => {
                assert_eq!(transaction.status, TransactionStatus::Success);
            },
            WebhookOutcome::Applied { .. } => panic!("redelivery must be reported as a duplicate"),
        }
        let again = api
            .db()
            .fetch_invoice_by_transaction_id(invoice.transaction_id)
            .await
            .unwrap()
            .expect("invoice vanished");
        assert_eq!(again.invoice_number, invoice.invoice_number);

        // a stale "deny" arriving after settlement is illegal and changes nothing
        let stale = webhook_payload("ORD1", "50000.00", "deny");
        let err = api.handle_webhook(&stale).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::IllegalTransition { .. }));
        let tx = api.db().fetch_transaction_by_order_id(&OrderId::from("ORD1")).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);

        tear_down(api).await;
    });
}

#[test]
fn webhook_rejects_bad_signatures() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (api, _gateway) = setup().await;
        api.process_payment(charge("ORD-SIG", 50_000), "user-1").await.expect("Error processing payment");

        // tamper with the amount after signing
        let mut payload: serde_json::Value =
            serde_json::from_str(&webhook_payload("ORD-SIG", "50000.00", "settlement")).unwrap();
        payload["gross_amount"] = json!("1.00");
        let err = api.handle_webhook(&payload.to_string()).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::InvalidSignature(_)));

        // unparseable body
        let err = api.handle_webhook("not json").await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::MalformedPayload(_)));

        // unknown order, validly signed
        let payload = webhook_payload("NO-SUCH-ORDER", "50000.00", "settlement");
        let err = api.handle_webhook(&payload).await.unwrap_err();
        assert!(matches!(err, PaymentFlowError::TransactionNotFound(_)));

        // nothing above may have moved the transaction
        let tx = api.db().fetch_transaction_by_order_id(&OrderId::from("ORD-SIG")).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        tear_down(api).await;
    });
}

#[test]
fn cancel_and_expiry() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (api, _gateway) = setup().await;

        api.process_payment(charge("ORD-C", 25_000), "user-2").await.expect("Error processing payment");
        let tx = api.cancel_payment(&OrderId::from("ORD-C")).await.expect("Error cancelling");
        assert_eq!(tx.status, TransactionStatus::Cancelled);
        // cancelling twice is a no-op, not an error
        let tx = api.cancel_payment(&OrderId::from("ORD-C")).await.expect("Error cancelling again");
        assert_eq!(tx.status, TransactionStatus::Cancelled);

        api.process_payment(charge("ORD-E", 25_000), "user-2").await.expect("Error processing payment");
        let payload = webhook_payload("ORD-E", "25000.00", "expire");
        let outcome = api.handle_webhook(&payload).await.expect("Error handling webhook");
        match outcome {
            WebhookOutcome::Applied { transaction, invoice } => {
                assert_eq!(transaction.status, TransactionStatus::Failed);
                assert!(invoice.is_none());
            },
            WebhookOutcome::Duplicate { .. } => panic!("expiry must apply"),
        }

        tear_down(api).await;
    });
}

#[test]
fn status_query_reconciles_local_state() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (api, gateway) = setup().await;
        api.process_payment(charge("ORD-Q", 100_000), "user-3").await.expect("Error processing payment");

        // the webhook never arrived, but the gateway knows the charge settled
        gateway.reply_to_status_with("settlement");
        let (tx, response) = api.get_transaction_status(&OrderId::from("ORD-Q")).await.expect("Error querying status");
        assert_eq!(response.transaction_status, "settlement");
        assert_eq!(tx.status, TransactionStatus::Success);
        let invoice = api.db().fetch_invoice_by_transaction_id(tx.id).await.unwrap();
        assert!(invoice.is_some(), "reconciliation into Success must generate the invoice");

        // a nonsensical gateway answer must not rewind the local record
        gateway.reply_to_status_with("expire");
        let (tx, _) = api.get_transaction_status(&OrderId::from("ORD-Q")).await.expect("Error querying status");
        assert_eq!(tx.status, TransactionStatus::Success);

        tear_down(api).await;
    });
}

#[test]
fn guarded_updates_reject_stale_preconditions() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let (api, _gateway) = setup().await;
        let result = api.process_payment(charge("ORD-G", 10_000), "user-5").await.expect("Error processing payment");
        let id = result.transaction.id;

        // the transaction is Pending, so an update expecting Success must hit zero rows
        let updated = api
            .db()
            .update_status_with_guard(id, TransactionStatus::Success, TransactionStatus::Refund, json!({}))
            .await
            .expect("Error running guarded update");
        assert!(updated.is_none());
        let tx = api.db().fetch_transaction_by_order_id(&OrderId::from("ORD-G")).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        // with the right precondition the same update applies
        let updated = api
            .db()
            .update_status_with_guard(id, TransactionStatus::Pending, TransactionStatus::Failed, json!({}))
            .await
            .expect("Error running guarded update");
        assert_eq!(updated.expect("guarded update must apply").status, TransactionStatus::Failed);

        tear_down(api).await;
    });
}

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

#[test]
fn settlement_fires_the_hook_exactly_once() {
    let rt = Runtime::new().unwrap();
    let event = HookCalled::default();
    let event_copy = event.clone();
    rt.block_on(async move {
        let mut hooks = EventHooks::default();
        hooks.on_payment_settled(move |ev| {
            info!("🪝️ {} settled with invoice {}", ev.transaction.order_id, ev.invoice.invoice_number);
            event_copy.called();
            Box::pin(async {}) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(10, hooks);
        let producers = handlers.producers();
        let (api, _gateway) = setup_with_producers(producers).await;

        let payload = webhook_payload("ORD-H", "75000.00", "settlement");
        api.process_payment(charge("ORD-H", 75_000), "user-4").await.expect("Error processing payment");
        api.handle_webhook(&payload).await.expect("Error handling webhook");
        // redelivery is a duplicate and must not fire the hook again
        api.handle_webhook(&payload).await.expect("Error handling duplicate webhook");

        tear_down(api).await;
        // all producers are dropped with the api, so the handler drains and shuts down
        handlers.start_handlers().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    });
    assert_eq!(event.count(), 1);
}
