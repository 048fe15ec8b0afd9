//! Card processor webhook.
//!
//! Deliveries reach the handler only once the signature middleware has verified them. The processor retries anything
//! that is not answered with a 2xx, so the response codes are chosen with that in mind:
//! * 200 for events that were applied, were already applied, are ignored, or can never be applied (an unknown order,
//!   an order in the wrong state). Retrying those would not change the outcome. The body says which it was.
//! * 400 when the event itself cannot be understood.
//! * 500 when the database failed, so that the processor delivers the event again later.
use actix_web::{web, HttpResponse};
use log::*;
use pharmacy_engine::{
    db_types::{OrderId, PaymentCapture},
    traits::{Notifier, PaymentProcessor, PharmacyDatabase},
    OrderFlowApi,
    OrderFlowError,
};
use stripe_tools::{EventKind, RefundStatus, WebhookEvent};

use crate::{
    data_objects::JsonResponse,
    errors::ServerError,
    integrations::stripe::{ACTOR_ID_KEY, COMMENT_KEY, ORDER_ID_KEY, PAYER_NAME_KEY},
    route,
};

route!(payment_webhook => Post "/payments" impl PharmacyDatabase, PaymentProcessor, Notifier);
pub async fn payment_webhook<B, P, N>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B, P, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let event = WebhookEvent::from_slice(&body)?;
    trace!("🪝️ Received webhook event {} ({})", event.id, event.event_type);
    let result = match event.kind() {
        EventKind::PaymentIntentSucceeded => on_payment_succeeded(&event, &api).await?,
        EventKind::PaymentIntentFailed => {
            let intent = event.payment_intent()?;
            let order_id = intent.metadata.get(ORDER_ID_KEY).map(String::as_str).unwrap_or("unknown");
            info!("🪝️ Payment attempt {} for order {order_id} failed. Nothing to do.", intent.id);
            JsonResponse::success("Payment failure noted.")
        },
        EventKind::RefundCreated => on_refund_created(&event, &api).await?,
        EventKind::Unhandled(kind) => {
            debug!("🪝️ Ignoring {kind} event {}", event.id);
            JsonResponse::success(format!("Event type {kind} is not handled."))
        },
    };
    Ok(HttpResponse::Ok().json(result))
}

async fn on_payment_succeeded<B, P, N>(
    event: &WebhookEvent,
    api: &OrderFlowApi<B, P, N>,
) -> Result<JsonResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let intent = event.payment_intent()?;
    let mut capture = PaymentCapture::new(intent.id.as_str());
    if let Some(order_id) = intent.metadata.get(ORDER_ID_KEY) {
        capture = capture.with_order_id(OrderId::from(order_id.as_str()));
    }
    if let Some(name) = intent.metadata.get(PAYER_NAME_KEY) {
        capture = capture.with_payer_name(name.as_str());
    }
    match api.confirm_payment(capture).await {
        Ok(confirmation) if confirmation.is_duplicate() => {
            info!("🪝️ Payment {} was already recorded. Nothing to do.", intent.id);
            Ok(JsonResponse::success("Payment already recorded."))
        },
        Ok(confirmation) if confirmation.needs_refund() => {
            let order = confirmation.order();
            warn!("🪝️ Payment {} was captured for order #{}, which is {}", intent.id, order.id, order.status);
            Ok(JsonResponse::failure(format!(
                "Order #{} is {}. The payment was recorded and must be refunded.",
                order.id, order.status
            )))
        },
        Ok(confirmation) => {
            info!("🪝️ Order #{} paid through {}", confirmation.order().id, intent.id);
            Ok(JsonResponse::success("Payment confirmed."))
        },
        Err(e) => domain_failure(&event.id, e),
    }
}

async fn on_refund_created<B, P, N>(
    event: &WebhookEvent,
    api: &OrderFlowApi<B, P, N>,
) -> Result<JsonResponse, ServerError>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    let refund = event.refund()?;
    if matches!(refund.status, RefundStatus::Failed | RefundStatus::Canceled) {
        warn!("🪝️ Refund {} was created with status {:?}. Not marking anything as refunded.", refund.id, refund.status);
        return Ok(JsonResponse::failure(format!("Refund {} did not go through.", refund.id)));
    }
    let order_id = refund.metadata.get(ORDER_ID_KEY).ok_or_else(|| {
        warn!("🪝️ Refund {} has no order id in its metadata", refund.id);
        ServerError::InvalidRequestBody(format!("Refund {} is missing the {ORDER_ID_KEY} metadata", refund.id))
    })?;
    let actor_id = refund.metadata.get(ACTOR_ID_KEY).ok_or_else(|| {
        warn!("🪝️ Refund {} has no actor in its metadata", refund.id);
        ServerError::InvalidRequestBody(format!("Refund {} is missing the {ACTOR_ID_KEY} metadata", refund.id))
    })?;
    let comment = refund.metadata.get(COMMENT_KEY).map(String::as_str);
    let order_id = OrderId::from(order_id.as_str());
    match api.confirm_refund(&order_id, actor_id, comment).await {
        Ok(record) if record.is_duplicate() => {
            info!("🪝️ Refund for order {order_id} was already recorded. Nothing to do.");
            Ok(JsonResponse::success("Refund already recorded."))
        },
        Ok(_) => {
            info!("🪝️ Refund {} for order {order_id} recorded", refund.id);
            Ok(JsonResponse::success("Refund recorded."))
        },
        Err(e) => domain_failure(&event.id, e),
    }
}

/// Database failures are answered with a 500 so the event is redelivered. Anything else will fail the same way
/// next time, so it is acknowledged.
fn domain_failure(event_id: &str, e: OrderFlowError) -> Result<JsonResponse, ServerError> {
    match e {
        OrderFlowError::Database(s) => {
            error!("🪝️ Could not process event {event_id}. {s}");
            Err(ServerError::BackendError(s))
        },
        e => {
            warn!("🪝️ Event {event_id} cannot be applied. {e}");
            Ok(JsonResponse::failure(e))
        },
    }
}
