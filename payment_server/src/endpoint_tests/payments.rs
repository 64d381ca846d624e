use actix_web::{
    http::StatusCode,
    test::{call_service, TestRequest},
};
use payment_core::{
    helpers::webhook_signature,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        stub_gateway::StubGateway,
    },
    SqliteDatabase,
    TransactionStore,
};
use serde_json::{json, Value};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use super::SERVER_KEY;

async fn setup_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await.expect("Error closing database");
    Sqlite::drop_database(&url).await.unwrap();
}

fn charge_body(order_id: &str, amount: i64) -> Value {
    json!({
        "order_id": order_id,
        "gross_amount": amount,
        "currency": "IDR",
        "customer": { "first_name": "Ayu", "last_name": null, "email": "ayu@example.com", "phone": null },
        "items": [{ "id": "svc-1", "name": "Premium subscription", "price": amount, "quantity": 1 }],
        "payment_method_hint": null,
    })
}

fn webhook_body(order_id: &str, gross_amount: &str, transaction_status: &str) -> Value {
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
}

#[actix_web::test]
async fn health_check() {
    let db = setup_db().await;
    let gateway = StubGateway::new();
    let service = test_app!(db, gateway);
    let req = TestRequest::get().uri("/health").to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    tear_down(db).await;
}

#[actix_web::test]
async fn create_payment_requires_a_user() {
    let db = setup_db().await;
    let gateway = StubGateway::new();
    let service = test_app!(db, gateway);

    let req = TestRequest::post().uri("/api/payments").set_json(charge_body("ORD1", 50_000)).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    tear_down(db).await;
}

#[actix_web::test]
async fn charge_webhook_and_status_round_trip() {
    let db = setup_db().await;
    let gateway = StubGateway::new();
    let service = test_app!(db, gateway);

    // create the charge
    let req = TestRequest::post()
        .uri("/api/payments")
        .insert_header(("X-User-Id", "user-1"))
        .set_json(charge_body("ORD1", 50_000))
        .to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = actix_web::test::read_body_json(res).await;
    assert_eq!(body["status"], "Pending");
    assert!(body["redirect_url"].as_str().is_some());

    // a duplicate order id is a conflict
    let req = TestRequest::post()
        .uri("/api/payments")
        .insert_header(("X-User-Id", "user-1"))
        .set_json(charge_body("ORD1", 50_000))
        .to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // settlement webhook
    let req =
        TestRequest::post().uri("/webhook/payment").set_json(webhook_body("ORD1", "50000.00", "settlement")).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_web::test::read_body_json(res).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("Invoice INV"));

    // duplicate delivery is still a 200
    let req =
        TestRequest::post().uri("/webhook/payment").set_json(webhook_body("ORD1", "50000.00", "settlement")).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    // stale notification after settlement is a conflict
    let req = TestRequest::post().uri("/webhook/payment").set_json(webhook_body("ORD1", "50000.00", "deny")).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // status endpoint reports the settled state
    gateway.reply_to_status_with("settlement");
    let req = TestRequest::get().uri("/api/payments/ORD1/status").to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_web::test::read_body_json(res).await;
    assert_eq!(body["status"], "Success");

    tear_down(db).await;
}

#[actix_web::test]
async fn webhook_rejections() {
    let db = setup_db().await;
    let gateway = StubGateway::new();
    let service = test_app!(db, gateway);

    let req = TestRequest::post()
        .uri("/api/payments")
        .insert_header(("X-User-Id", "user-1"))
        .set_json(charge_body("ORD2", 75_000))
        .to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    // tampered amount invalidates the signature
    let mut body = webhook_body("ORD2", "75000.00", "settlement");
    body["gross_amount"] = json!("1.00");
    let req = TestRequest::post().uri("/webhook/payment").set_json(body).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // unknown order
    let req =
        TestRequest::post().uri("/webhook/payment").set_json(webhook_body("GHOST", "75000.00", "settlement")).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // unparseable payload
    let req = TestRequest::post().uri("/webhook/payment").set_payload("not json").to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    tear_down(db).await;
}

#[actix_web::test]
async fn refund_endpoint_enforces_the_remainder() {
    let db = setup_db().await;
    let gateway = StubGateway::new();
    gateway.reply_to_charge_with("capture");
    let service = test_app!(db, gateway);

    let req = TestRequest::post()
        .uri("/api/payments")
        .insert_header(("X-User-Id", "user-1"))
        .set_json(charge_body("ORD3", 100_000))
        .to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = actix_web::test::read_body_json(res).await;
    assert_eq!(body["status"], "Success");

    let req = TestRequest::post().uri("/api/payments/ORD3/refund").set_json(json!({ "amount": 30_000 })).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = actix_web::test::read_body_json(res).await;
    assert_eq!(body["status"], "Refund");

    let req = TestRequest::post().uri("/api/payments/ORD3/refund").set_json(json!({ "amount": 90_000 })).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // no amount refunds the remainder
    let req = TestRequest::post().uri("/api/payments/ORD3/refund").set_json(json!({})).to_request();
    let res = call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    tear_down(db).await;
}
