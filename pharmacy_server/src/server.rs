use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use pharmacy_engine::{
    events::{EventHandlers, EventProducers},
    OrderFlowApi,
    OrdersApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{notifier::RelayNotifier, stripe::StripeProcessor},
    live_updates::LiveUpdates,
    middleware::{IdentityMiddlewareFactory, SignatureMiddlewareFactory},
    routes::{
        health,
        CancelOrderRoute,
        ConfirmPaymentReturnRoute,
        CreatePaymentIntentRoute,
        FulfilOrderRoute,
        GuestOrderRoute,
        LiveUpdatesRoute,
        MyOrdersRoute,
        OrderDetailsRoute,
        OrderHistoryRoute,
        PlaceOrderRoute,
        RecordPaymentRoute,
        RefundOrderRoute,
        RejectOrderRoute,
        SearchOrdersRoute,
    },
    webhook_routes::PaymentWebhookRoute,
};

/// Capacity of the queue between the order flow and the live update hub
const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let processor = StripeProcessor::new(config.stripe.clone(), &config.currency)
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier =
        RelayNotifier::new(config.notifications.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hub = LiveUpdates::new(config.live_update_buffer);
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hub.hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, processor, notifier, producers, hub)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    processor: StripeProcessor,
    notifier: RelayNotifier,
    producers: EventProducers,
    hub: LiveUpdates,
) -> Result<Server, ServerError> {
    let webhook_secret = config.stripe.webhook_secret.clone();
    let webhook_tolerance = config.stripe.webhook_tolerance_secs;
    let srv = HttpServer::new(move || {
        let flow_api = OrderFlowApi::new(db.clone(), processor.clone(), notifier.clone(), producers.clone());
        let orders_api = OrdersApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("rx::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(hub.clone()));
        // Routes for identified users. The ACL middleware on individual routes restricts them further.
        let api_scope = web::scope("/api")
            .wrap(IdentityMiddlewareFactory)
            .service(PlaceOrderRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(OrderDetailsRoute::<SqliteDatabase>::new())
            .service(OrderHistoryRoute::<SqliteDatabase>::new())
            .service(FulfilOrderRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(RejectOrderRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(CancelOrderRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(RefundOrderRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(RecordPaymentRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(LiveUpdatesRoute::new());
        let webhook_scope = web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(webhook_secret.clone(), webhook_tolerance))
            .service(PaymentWebhookRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new());
        app.service(health)
            .service(ConfirmPaymentReturnRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(GuestOrderRoute::<SqliteDatabase>::new())
            .service(CreatePaymentIntentRoute::<SqliteDatabase, StripeProcessor, RelayNotifier>::new())
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Server is listening on {}:{}", config.host, config.port);
    Ok(srv)
}
