//! In-process endpoint tests: a real SQLite store, a scripted gateway, and the full route table.

// Builds an initialized test service with the same route layout as the production server.
macro_rules! test_app {
    ($db:expr, $gateway:expr) => {{
        let api = payment_core::PaymentFlowApi::new(
            $db.clone(),
            $gateway.clone(),
            pay_common::Secret::new(super::SERVER_KEY.to_string()),
            payment_core::events::EventProducers::default(),
        );
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(api))
                .service($crate::routes::health)
                .service(
                    actix_web::web::scope("/api")
                        .service($crate::routes::CreatePaymentRoute::<
                            payment_core::SqliteDatabase,
                            payment_core::test_utils::stub_gateway::StubGateway,
                        >::new())
                        .service($crate::routes::PaymentStatusRoute::<
                            payment_core::SqliteDatabase,
                            payment_core::test_utils::stub_gateway::StubGateway,
                        >::new())
                        .service($crate::routes::CancelPaymentRoute::<
                            payment_core::SqliteDatabase,
                            payment_core::test_utils::stub_gateway::StubGateway,
                        >::new())
                        .service($crate::routes::RefundPaymentRoute::<
                            payment_core::SqliteDatabase,
                            payment_core::test_utils::stub_gateway::StubGateway,
                        >::new()),
                )
                .service(actix_web::web::scope("/webhook").service($crate::routes::PaymentWebhookRoute::<
                    payment_core::SqliteDatabase,
                    payment_core::test_utils::stub_gateway::StubGateway,
                >::new())),
        )
        .await
    }};
}

mod payments;

pub const SERVER_KEY: &str = "SB-endpoint-test-key";
