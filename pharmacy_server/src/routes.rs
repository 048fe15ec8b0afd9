//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Routes fall into three groups:
//! * Public routes: the health check and the guest payment page (`/pay/...`). Anyone holding an order code may see
//!   the order and pay for it.
//! * Identified routes under `/api`. The caller's identity comes from the identity middleware. Routes marked
//!   `requires [...]` are additionally guarded by the ACL middleware; the order flow API checks roles and ownership
//!   again, so a route without an ACL is never more permissive than the business rules.
//! * The card processor webhook, in [`crate::webhook_routes`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Database calls and calls to the card processor must stay async.
use actix_web::{get, http::header, web, HttpResponse, Responder};
use log::*;
use pharmacy_engine::{
    db_types::{OrderId, Role},
    order_objects::{NewOrder, OrderQueryFilter},
    traits::{Notifier, OrderManagement, PaymentProcessor, PharmacyDatabase},
    OrderFlowApi,
    OrdersApi,
};
use serde_json::json;

use crate::{
    data_objects::{
        CommentParams,
        OfflinePaymentParams,
        PaymentIntentParams,
        PaymentReturnParams,
        RejectParams,
    },
    errors::ServerError,
    live_updates::LiveUpdates,
    middleware::Caller,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

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

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+])  => {
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
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
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

//----------------------------------------------   Guest payments  ----------------------------------------------------
route!(guest_order => Get "/pay/{code}" impl OrderManagement);
/// The order behind a shareable code: amount, status and items. No personal details.
pub async fn guest_order<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    trace!("💻️ Guest lookup for code {code}");
    let view = api.guest_order(&code).await?;
    Ok(HttpResponse::Ok().json(view))
}

route!(create_payment_intent => Post "/pay/{code}/intent" impl PharmacyDatabase, PaymentProcessor, Notifier);
/// Starts (or resumes) a card payment for the order with the given code. Anyone holding the code may pay.
pub async fn create_payment_intent<B, P, N>(
    path: web::Path<String>,
    body: Option<web::Json<PaymentIntentParams>>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let code = path.into_inner();
    let payer_name = body.and_then(|b| b.into_inner().payer_name).filter(|s| !s.trim().is_empty());
    debug!("💻️ Payment intent requested for code {code}");
    let intent = api.create_payment_intent(&code, payer_name).await?;
    Ok(HttpResponse::Ok().json(intent))
}

route!(confirm_payment_return => Post "/pay/confirm" impl PharmacyDatabase, PaymentProcessor, Notifier);
/// The browser is back from the card processor. The intent is checked with the processor before anything changes.
pub async fn confirm_payment_return<B, P, N>(
    body: web::Json<PaymentReturnParams>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let intent_id = body.into_inner().intent_id;
    debug!("💻️ Browser returned from payment of {intent_id}");
    let confirmation = api.confirm_payment_return(&intent_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "order": confirmation.order(),
        "duplicate": confirmation.is_duplicate(),
        "refund_due": confirmation.needs_refund(),
    })))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl PharmacyDatabase, PaymentProcessor, Notifier);
pub async fn place_order<B, P, N>(
    caller: Caller,
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    debug!("💻️ New order from {}", caller.user_id);
    let placed = api.place_order(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(placed))
}

route!(my_orders => Get "/orders" impl OrderManagement);
/// The caller's own orders, or every order for staff. Newest first.
pub async fn my_orders<B: OrderManagement>(
    caller: Caller,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Fetching orders for {}", caller.user_id);
    let orders = api.orders_for_actor(&caller).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(search_orders => Post "/orders/search" impl OrderManagement where requires [Role::Staff, Role::Admin]);
pub async fn search_orders<B: OrderManagement>(
    caller: Caller,
    body: web::Json<OrderQueryFilter>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.search_orders(&caller, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_details => Get "/orders/{order_id}" impl OrderManagement);
pub async fn order_details<B: OrderManagement>(
    caller: Caller,
    path: web::Path<String>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let details = api.order_details(&caller, &order_id).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(order_history => Get "/orders/{order_id}/history" impl OrderManagement);
pub async fn order_history<B: OrderManagement>(
    caller: Caller,
    path: web::Path<String>,
    api: web::Data<OrdersApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let history = api.status_history(&caller, &order_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

//----------------------------------------------   Order actions  ----------------------------------------------------
route!(fulfil_order => Post "/orders/{order_id}/fulfil" impl PharmacyDatabase, PaymentProcessor, Notifier where requires [Role::Staff, Role::Admin]);
pub async fn fulfil_order<B, P, N>(
    caller: Caller,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let order_id = OrderId::from(path.into_inner());
    let order = api.fulfill_order(&caller, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(reject_order => Post "/orders/{order_id}/reject" impl PharmacyDatabase, PaymentProcessor, Notifier where requires [Role::Staff, Role::Admin]);
pub async fn reject_order<B, P, N>(
    caller: Caller,
    path: web::Path<String>,
    body: web::Json<RejectParams>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let order_id = OrderId::from(path.into_inner());
    let order = api.reject_order(&caller, &order_id, &body.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl PharmacyDatabase, PaymentProcessor, Notifier);
/// Only the user who placed the order may cancel it. The flow API enforces this.
pub async fn cancel_order<B, P, N>(
    caller: Caller,
    path: web::Path<String>,
    body: Option<web::Json<CommentParams>>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let order_id = OrderId::from(path.into_inner());
    let comment = body.and_then(|b| b.into_inner().comment);
    let order = api.cancel_order(&caller, &order_id, comment.as_deref()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(refund_order => Post "/orders/{order_id}/refund" impl PharmacyDatabase, PaymentProcessor, Notifier where requires [Role::Staff, Role::Admin]);
/// Card refunds are only initiated here. The order is marked refunded when the processor confirms the refund.
pub async fn refund_order<B, P, N>(
    caller: Caller,
    path: web::Path<String>,
    body: Option<web::Json<CommentParams>>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let order_id = OrderId::from(path.into_inner());
    let comment = body.and_then(|b| b.into_inner().comment);
    let outcome = api.refund_order(&caller, &order_id, comment.as_deref()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(record_payment => Post "/orders/{order_id}/payment" impl PharmacyDatabase, PaymentProcessor, Notifier where requires [Role::Staff, Role::Admin]);
/// Records a cash or transfer payment taken by staff.
pub async fn record_payment<B, P, N>(
    caller: Caller,
    path: web::Path<String>,
    body: web::Json<OfflinePaymentParams>,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let order_id = OrderId::from(path.into_inner());
    let params = body.into_inner();
    let (order, payment) =
        api.record_offline_payment(&caller, &order_id, params.method, params.payer_name.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "order": order, "payment": payment })))
}

//----------------------------------------------   Live updates  ----------------------------------------------------
route!(live_updates => Get "/live" requires [Role::Staff, Role::Admin]);
/// A server-sent event stream of new orders, status changes and payments.
pub async fn live_updates(caller: Caller, hub: web::Data<LiveUpdates>) -> HttpResponse {
    info!("📡️ {} connected to live updates. {} clients connected", caller.user_id, hub.client_count() + 1);
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(hub.event_stream())
}
