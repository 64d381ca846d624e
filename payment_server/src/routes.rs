//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the store and gateway traits so that endpoint tests can run against lightweight
//! backends, and since actix cannot register generic handlers through its attribute macros, registration goes
//! through the `route!` macro instead.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use pay_common::MinorUnits;
use payment_core::{
    db_types::OrderId,
    gateway_types::ChargeRequest,
    traits::{PaymentGateway, TransactionStore},
    PaymentFlowApi,
    WebhookOutcome,
};

use crate::{
    data_objects::{JsonResponse, PaymentResult, RefundRequest},
    errors::ServerError,
    helpers::get_user_id,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payments" impl TransactionStore, PaymentGateway);
/// Route handler for charge creation.
///
/// The authenticated user is taken from the `X-User-Id` header. The request body is validated, a pending
/// transaction is stored, and the charge is submitted to the gateway; the response carries the redirect URL / token
/// the client needs to let the customer complete the payment.
pub async fn create_payment<B, G>(
    req: HttpRequest,
    body: web::Json<ChargeRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    let user_id = get_user_id(&req)?;
    let charge = body.into_inner();
    debug!("💻️ POST new charge {} for user {user_id}", charge.order_id);
    let result = api.process_payment(charge, &user_id).await?;
    info!("💻️ Charge {} created. Status: {}", result.transaction.order_id, result.transaction.status);
    Ok(HttpResponse::Created().json(PaymentResult::from(result)))
}

route!(payment_status => Get "/payments/{order_id}/status" impl TransactionStore, PaymentGateway);
/// Route handler for the status endpoint.
///
/// Queries the gateway for the charge's current status and reconciles the local record against it, so the caller
/// always sees the freshest legal state even if a webhook went missing.
pub async fn payment_status<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET status for {order_id}");
    let (transaction, response) = api.get_transaction_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(PaymentResult::new(&transaction, Some(&response))))
}

route!(cancel_payment => Post "/payments/{order_id}/cancel" impl TransactionStore, PaymentGateway);
pub async fn cancel_payment<B, G>(
    path: web::Path<String>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST cancel {order_id}");
    let transaction = api.cancel_payment(&order_id).await?;
    info!("💻️ Charge {order_id} cancelled");
    Ok(HttpResponse::Ok().json(PaymentResult::new(&transaction, None)))
}

route!(refund_payment => Post "/payments/{order_id}/refund" impl TransactionStore, PaymentGateway);
/// Route handler for refunds. An absent or null `amount` refunds whatever has not been refunded yet.
pub async fn refund_payment<B, G>(
    path: web::Path<String>,
    body: web::Json<RefundRequest>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    let amount = body.into_inner().amount.map(MinorUnits::from);
    debug!("💻️ POST refund {order_id}");
    let transaction = api.refund_payment(&order_id, amount).await?;
    info!("💻️ Refund for {order_id} accepted. Refunded so far: {}", transaction.refunded_total());
    Ok(HttpResponse::Ok().json(PaymentResult::new(&transaction, None)))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/payment" impl TransactionStore, PaymentGateway);
/// Route handler for gateway status callbacks.
///
/// The raw body is handed to the webhook API, which parses it, verifies the signature and applies the status
/// change. Unlike storefront webhooks, the gateway honours HTTP error codes and will retry on them, so failures
/// are reported honestly: 401 for a bad signature, 404 for an unknown order, 409 for an illegal transition, 5xx
/// for backend trouble. A duplicate delivery is a success, not an error.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: String,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    G: PaymentGateway,
{
    trace!("📨️ Received webhook request: {}", req.uri());
    let response = match api.handle_webhook(&body).await? {
        WebhookOutcome::Applied { transaction, invoice } => {
            info!("📨️ Webhook moved {} to {}", transaction.order_id, transaction.status);
            match invoice {
                Some(invoice) => {
                    JsonResponse::success(format!("Transaction settled. Invoice {}", invoice.invoice_number))
                },
                None => JsonResponse::success(format!("Transaction is now {}", transaction.status)),
            }
        },
        WebhookOutcome::Duplicate { transaction } => {
            info!("📨️ Duplicate webhook delivery for {}", transaction.order_id);
            JsonResponse::success("Duplicate delivery. Nothing to do.")
        },
    };
    Ok(HttpResponse::Ok().json(response))
}
