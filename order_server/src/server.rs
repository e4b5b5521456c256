use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{
    future::{ok, BoxFuture},
    FutureExt,
};
use log::*;
use order_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CatalogApi,
    CheckoutApi,
    OrderFlowApi,
    PaymentApi,
    ReconciliationApi,
    ReviewApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::{AuthError, ServerError},
    expiry_worker::start_expiry_worker,
    helpers::get_remote_ip,
    integrations::HttpPaymentProvider,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        AdjustStockRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        GatewayEventsRoute,
        GatewayWebhookRoute,
        MyCartRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        PaymentsForOrderRoute,
        ProcessOrderRoute,
        RefundOrderRoute,
        ResolveReviewFlagRoute,
        ReviewFlagsRoute,
        StartPaymentRoute,
        StockLevelRoute,
        StockMovementsRoute,
        UpdateCartRoute,
        VerifyPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider = HttpPaymentProvider::new(config.gateway.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_event_handlers(db.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _expiry_worker =
        start_expiry_worker(db.clone(), provider.clone(), producers.clone(), config.unpaid_order_timeout);
    let srv = create_server_instance(config, db, provider, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Rejected webhook signatures go into the review queue. Everything else is logged.
pub fn create_event_handlers(db: SqliteDatabase) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let review_api = Arc::new(ReviewApi::new(db, EventProducers::default()));
    hooks.on_signature_rejected(move |ev| {
        let api = Arc::clone(&review_api);
        Box::pin(async move {
            match api.record_signature_rejection(ev).await {
                Ok(flag) => debug!("📬️ Rejected webhook signature recorded as review flag #{}", flag.id),
                Err(e) => error!("📬️ Could not record a rejected webhook signature. {e}"),
            }
        })
    });
    hooks.on_order_created(|ev| {
        info!("📬️ Order {} created for {}: {} {}", ev.order.order_id, ev.order.owner_id, ev.order.total, ev.order.currency);
        no_op()
    });
    hooks.on_order_confirmed(|ev| {
        info!("📬️ Order {} confirmed by payment [{}]", ev.order.order_id, ev.payment.tx_ref);
        no_op()
    });
    hooks.on_order_annulled(|ev| {
        info!(
            "📬️ Order {} is now {} ({:?}). Was {}. {} lines restocked",
            ev.order.order_id, ev.order.status, ev.reason, ev.previous_status, ev.restocked
        );
        no_op()
    });
    hooks.on_review_flagged(|ev| {
        warn!("📬️ Review flag #{} raised: {}. {}", ev.flag.id, ev.flag.reason, ev.flag.details);
        no_op()
    });
    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    provider: HttpPaymentProvider,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let checkout_options = config.checkout_options();
    let srv = HttpServer::new(move || {
        let catalog_api = CatalogApi::new(db.clone());
        let checkout_api =
            CheckoutApi::new(db.clone(), config.pricing.clone(), producers.clone()).with_options(checkout_options);
        let payment_api = PaymentApi::new(db.clone(), provider.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), provider.clone(), producers.clone());
        let order_flow_api = OrderFlowApi::new(db.clone(), provider.clone(), producers.clone())
            .with_refund_policy(config.refund_policy);
        let review_api = ReviewApi::new(db.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(order_flow_api))
            .app_data(web::Data::new(review_api));
        // Every route in this scope needs a caller identity
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(OrderByIdRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(CancelOrderRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(ProcessOrderRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(RefundOrderRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(StartPaymentRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(PaymentsForOrderRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .service(GatewayEventsRoute::<SqliteDatabase>::new())
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(UpdateCartRoute::<SqliteDatabase>::new())
            .service(StockMovementsRoute::<SqliteDatabase>::new())
            .service(AdjustStockRoute::<SqliteDatabase>::new())
            .service(StockLevelRoute::<SqliteDatabase>::new())
            .service(ReviewFlagsRoute::<SqliteDatabase>::new())
            .service(ResolveReviewFlagRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.webhook.whitelist.clone();
        let hmac_middleware = HmacMiddlewareFactory::new(
            &config.webhook.hmac_header,
            config.webhook.hmac_secret.clone(),
            config.webhook.hmac_checks,
            producers.clone(),
            use_x_forwarded_for,
            use_forwarded,
        );
        let gateway_scope = web::scope("/gateway")
            .service(GatewayWebhookRoute::<SqliteDatabase, HttpPaymentProvider>::new())
            .wrap(hmac_middleware)
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                let whitelisted = match (peer_ip, &whitelist) {
                    (Some(ip), Some(whitelist)) => {
                        info!("💻️ Gateway webhook from {ip}");
                        whitelist.contains(&ip)
                    },
                    (_, None) => true,
                    (None, Some(_)) => {
                        warn!("💻️ No IP address found for a gateway webhook, denying access.");
                        false
                    },
                };
                if whitelisted {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(ServerError::AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            });
        app.service(health).service(api_scope).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
