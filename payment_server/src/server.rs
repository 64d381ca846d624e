use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_client::GatewayApi;
use log::*;
use payment_core::{
    events::{EventHandlers, EventHooks, EventProducers},
    PaymentFlowApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        CancelPaymentRoute,
        CreatePaymentRoute,
        PaymentStatusRoute,
        PaymentWebhookRoute,
        RefundPaymentRoute,
    },
};

/// How many events may queue up before settlement hook publishing applies backpressure.
const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The stock settlement hook: log the settlement. Mail and loyalty integrations subscribe here in deployments that
/// carry them.
fn default_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_payment_settled(|ev| {
        Box::pin(async move {
            info!(
                "🪝️ Transaction {} settled for {} {}. Invoice {} (total {}) issued.",
                ev.transaction.order_id,
                ev.transaction.amount,
                ev.transaction.currency,
                ev.invoice.invoice_number,
                ev.invoice.total
            );
        })
    });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let server_key = config.gateway.server_key.clone();
    let srv = HttpServer::new(move || {
        let api = PaymentFlowApi::new(db.clone(), gateway.clone(), server_key.clone(), producers.clone());
        let api_scope = web::scope("/api")
            .service(CreatePaymentRoute::<SqliteDatabase, GatewayApi>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, GatewayApi>::new())
            .service(CancelPaymentRoute::<SqliteDatabase, GatewayApi>::new())
            .service(RefundPaymentRoute::<SqliteDatabase, GatewayApi>::new());
        let webhook_scope =
            web::scope("/webhook").service(PaymentWebhookRoute::<SqliteDatabase, GatewayApi>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ppc::access_log"))
            .app_data(web::Data::new(api))
            .service(health)
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
