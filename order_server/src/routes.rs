//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the database or the payment provider
//! instead of blocking.
use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::WebhookPayload;
use log::*;
use order_engine::{
    db_types::{NewGatewayEvent, OrderId, Role},
    helpers::validate_sku,
    traits::{
        CatalogManagement,
        InsertOrderResult,
        OrderManagement,
        PaymentManagement,
        PaymentProvider,
        ProviderReport,
        ReviewManagement,
    },
    CatalogApi,
    CheckoutApi,
    OrderFlowApi,
    PaymentApi,
    ReconcileError,
    ReconciliationApi,
    ReviewApi,
};

use crate::{
    auth::Caller,
    data_objects::{
        CancelRequest,
        CartUpdateRequest,
        CreateOrderRequest,
        JsonResponse,
        PaymentLinkResponse,
        StockAdjustRequest,
        VerifyRequest,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ with PaymentProvider where requires [$($roles:path),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A, P>(core::marker::PhantomData<fn() -> (A, P)>);}
        paste::paste! { impl<A, P> [<$name:camel Route>]<A, P> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (A, P)>)
            }
        }}
        paste::paste! { impl<A, P> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A, P>
        where
            A: $($bounds +)+ 'static,
            P: order_engine::traits::PaymentProvider + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A, P>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ with PaymentProvider) => {
        paste::paste! { pub struct [<$name:camel Route>]<A, P>(core::marker::PhantomData<fn() -> (A, P)>);}
        paste::paste! { impl<A, P> [<$name:camel Route>]<A, P> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (A, P)>)
            }
        }}
        paste::paste! { impl<A, P> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A, P>
        where
            A: $($bounds +)+ 'static,
            P: order_engine::traits::PaymentProvider + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A, P>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:path),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
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

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl CatalogManagement, OrderManagement);
/// Turns the caller's cart into a `Pending` order.
///
/// Returns 201 with the new order. Repeating the request with the same idempotency key returns the original order
/// with a 200, without touching the cart or stock again.
pub async fn create_order<B>(
    caller: Caller,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: CatalogManagement + OrderManagement,
{
    let request = body.into_inner();
    debug!("💻️ POST order for {} with key {}", caller.owner_id, request.idempotency_key);
    let result = api.checkout(&caller.owner_id, request.details(), &request.idempotency_key).await?;
    let response = match result {
        InsertOrderResult::Inserted(order) => HttpResponse::Created().json(order),
        InsertOrderResult::Replayed(order) => HttpResponse::Ok().json(order),
    };
    Ok(response)
}

route!(my_orders => Get "/orders" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider);
pub async fn my_orders<B, P>(caller: Caller, api: web::Data<OrderFlowApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    debug!("💻️ GET orders for {}", caller.owner_id);
    let orders = api.orders_for_owner(&caller.owner_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{order_id}" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider);
pub async fn order_by_id<B, P>(
    caller: Caller,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", caller.owner_id);
    let detail = api.fetch_order(&order_id, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(cancel_order => Put "/orders/{order_id}/cancel" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider);
/// Cancels a `Pending` or `Confirmed` order. The body, `{ "reason": "..." }`, is optional.
pub async fn cancel_order<B, P>(
    caller: Caller,
    path: web::Path<OrderId>,
    body: Option<web::Json<CancelRequest>>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ PUT cancel order {order_id} for {}", caller.owner_id);
    let annulment = api.cancel_order(&order_id, reason, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(annulment.order))
}

route!(process_order => Put "/orders/{order_id}/process" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider where requires [Role::Vendor, Role::Admin]);
pub async fn process_order<B, P>(
    caller: Caller,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ PUT process order {order_id} by {}", caller.owner_id);
    let order = api.start_processing(&order_id, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(refund_order => Put "/orders/{order_id}/refund" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider where requires [Role::Admin]);
pub async fn refund_order<B, P>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    info!("💻️ PUT refund order {order_id}");
    let annulment = api.refund_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(annulment))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(start_payment => Post "/orders/{order_id}/payment" impl OrderManagement, PaymentManagement with PaymentProvider);
/// Asks the payment provider for a payment link for a `Pending` order.
pub async fn start_payment<B, P>(
    caller: Caller,
    path: web::Path<OrderId>,
    api: web::Data<PaymentApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ POST payment for order {order_id} by {}", caller.owner_id);
    let payment = api.create_intent(&order_id, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(PaymentLinkResponse::from(payment)))
}

route!(payments_for_order => Get "/orders/{order_id}/payments" impl OrderManagement, PaymentManagement with PaymentProvider);
pub async fn payments_for_order<B, P>(
    caller: Caller,
    path: web::Path<OrderId>,
    api: web::Data<PaymentApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement,
    P: PaymentProvider,
{
    let order_id = path.into_inner();
    debug!("💻️ GET payments for order {order_id}");
    let payments = api.payments_for_order(&order_id, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

route!(verify_payment => Post "/payments/verify" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider);
/// Called when the customer returns from the payment page. Asks the provider what happened and reconciles the answer.
pub async fn verify_payment<B, P>(
    caller: Caller,
    body: web::Json<VerifyRequest>,
    api: web::Data<ReconciliationApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    let VerifyRequest { tx_ref } = body.into_inner();
    debug!("💻️ POST verify [{tx_ref}] for {}", caller.owner_id);
    let result = api.verify_payment(&tx_ref, &caller.scope()).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Cart  ----------------------------------------------------
route!(my_cart => Get "/cart" impl CatalogManagement);
pub async fn my_cart<B: CatalogManagement>(
    caller: Caller,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = api.fetch_cart(&caller.owner_id).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(update_cart => Put "/cart/items" impl CatalogManagement);
/// Sets the quantity of one SKU in the caller's cart and returns the whole cart. A quantity of zero removes the line.
pub async fn update_cart<B: CatalogManagement>(
    caller: Caller,
    body: web::Json<CartUpdateRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let sku = validate_sku(request.sku().as_str())?;
    debug!("💻️ PUT cart {} x{} for {}", sku, request.quantity, caller.owner_id);
    let cart = api.set_cart_quantity(&caller.owner_id, &sku, request.quantity).await?;
    Ok(HttpResponse::Ok().json(cart))
}

//----------------------------------------------   Stock  ----------------------------------------------------
route!(stock_level => Get "/stock/{sku:.+}" impl CatalogManagement where requires [Role::Vendor, Role::Admin]);
pub async fn stock_level<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sku = validate_sku(&path.into_inner())?;
    let level = api.stock_level(&sku).await?;
    Ok(HttpResponse::Ok().json(level))
}

route!(stock_movements => Get "/stock/{sku:.+}/movements" impl CatalogManagement where requires [Role::Admin]);
pub async fn stock_movements<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sku = validate_sku(&path.into_inner())?;
    let movements = api.stock_movements(&sku).await?;
    Ok(HttpResponse::Ok().json(movements))
}

route!(adjust_stock => Post "/stock/{sku:.+}/adjust" impl CatalogManagement where requires [Role::Admin]);
/// Applies a signed adjustment to the stock ledger. Stock can never go below zero.
pub async fn adjust_stock<B: CatalogManagement>(
    caller: Caller,
    path: web::Path<String>,
    body: web::Json<StockAdjustRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let sku = validate_sku(&path.into_inner())?;
    let StockAdjustRequest { delta, note } = body.into_inner();
    if delta == 0 {
        return Err(ServerError::ValidationError("A stock adjustment cannot be zero".into()));
    }
    info!("💻️ {} adjusts stock of {sku} by {delta}", caller.owner_id);
    let level = api.adjust_stock(&sku, delta, note).await?;
    Ok(HttpResponse::Ok().json(level))
}

//----------------------------------------------   Review queue  ----------------------------------------------------
route!(review_flags => Get "/reviews" impl ReviewManagement where requires [Role::Admin]);
pub async fn review_flags<B: ReviewManagement>(api: web::Data<ReviewApi<B>>) -> Result<HttpResponse, ServerError> {
    let flags = api.unresolved_flags().await?;
    Ok(HttpResponse::Ok().json(flags))
}

route!(resolve_review_flag => Put "/reviews/{id}/resolve" impl ReviewManagement where requires [Role::Admin]);
pub async fn resolve_review_flag<B: ReviewManagement>(
    caller: Caller,
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ Review flag #{id} resolved by {}", caller.owner_id);
    let flag = api.resolve(id).await?;
    Ok(HttpResponse::Ok().json(flag))
}

route!(gateway_events => Get "/payments/{tx_ref}/events" impl ReviewManagement where requires [Role::Admin]);
/// Every webhook delivery received for a transaction reference, oldest first.
pub async fn gateway_events<B: ReviewManagement>(
    path: web::Path<String>,
    api: web::Data<ReviewApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let events = api.gateway_events(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(events))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(gateway_webhook => Post "/webhook" impl OrderManagement, PaymentManagement, ReviewManagement with PaymentProvider);
/// Receives payment notifications from the provider. The signature has already been checked by the HMAC middleware.
///
/// The delivery is journalled before it is reconciled. Once it has been journalled, the provider gets a 200 whatever
/// the business outcome, so that it does not keep retrying a delivery we have already dealt with. A 503 is returned
/// only when the delivery could not be journalled.
pub async fn gateway_webhook<B, P>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + PaymentManagement + ReviewManagement,
    P: PaymentProvider,
{
    trace!("💻️ Received webhook delivery of {} bytes", body.len());
    let payload = String::from_utf8(body.to_vec()).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let webhook: WebhookPayload = serde_json::from_str(&payload).map_err(|e| {
        warn!("💻️ Could not read webhook delivery. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    let amount = webhook.data.amount().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let report = ProviderReport {
        tx_ref: webhook.data.tx_ref.clone(),
        status: webhook.data.status.clone(),
        amount,
        currency: webhook.data.currency.clone(),
        provider_tx_id: webhook.data.provider_tx_id(),
    };
    let delivery = NewGatewayEvent {
        event: webhook.event,
        tx_ref: webhook.data.tx_ref,
        status: webhook.data.status,
        amount,
        currency: webhook.data.currency,
        payload,
    };
    let receipt = api.process_webhook(delivery, report).await.map_err(|e| match e {
        ReconcileError::DatabaseError(s) | ReconcileError::StoreUnavailable(s) => {
            error!("💻️ Could not journal webhook delivery. {s}");
            ServerError::ServiceUnavailable(s)
        },
        e => ServerError::from(e),
    })?;
    let event_id = receipt.event.id;
    let response = match receipt.result {
        Ok(result) => {
            info!("💻️ Webhook #{event_id} for [{}]: {}", result.payment.tx_ref, result.outcome);
            JsonResponse::success(result.outcome)
        },
        Err(ReconcileError::DatabaseError(s) | ReconcileError::StoreUnavailable(s)) => {
            // Journalled, but not applied. Ask the provider to try again.
            error!("💻️ Webhook #{event_id} could not be reconciled. {s}");
            return Err(ServerError::ServiceUnavailable(s));
        },
        Err(e) => {
            warn!("💻️ Webhook #{event_id} was recorded but not applied. {e}");
            JsonResponse::failure(e)
        },
    };
    Ok(HttpResponse::Ok().json(response))
}
