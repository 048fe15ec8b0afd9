use actix_web::{body::MessageBody, http::StatusCode, test, web, App};
use chrono::Utc;
use pharmacy_common::Secret;
use pharmacy_engine::{
    db_types::{OrderStatusType, PaymentStatus},
    order_objects::RefundOutcome,
    test_utils::fakes::{FakeNotifier, FakePaymentProcessor},
    traits::OrderManagement,
    OrderFlowApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use stripe_tools::webhook::{sign_payload, SIGNATURE_HEADER};

use super::lifecycle::TestServer;
use crate::{middleware::SignatureMiddlewareFactory, webhook_routes::PaymentWebhookRoute};

const SECRET: &str = "whsec_endpoint_tests";

type Flow = OrderFlowApi<SqliteDatabase, FakePaymentProcessor, FakeNotifier>;

/// Delivers `payload` to the webhook endpoint. `signature` overrides the header; `None` signs the payload properly.
async fn deliver(flow: Flow, payload: &[u8], signature: Option<&str>) -> (StatusCode, String) {
    let app = App::new().app_data(web::Data::new(flow)).service(
        web::scope("/webhook")
            .wrap(SignatureMiddlewareFactory::new(Secret::new(SECRET.to_string()), 300))
            .service(PaymentWebhookRoute::<SqliteDatabase, FakePaymentProcessor, FakeNotifier>::new()),
    );
    let service = test::init_service(app).await;
    let header = match signature {
        Some(s) => s.to_string(),
        None => sign_payload(payload, SECRET, Utc::now().timestamp()).unwrap(),
    };
    let req = test::TestRequest::post()
        .uri("/webhook/payments")
        .insert_header((SIGNATURE_HEADER, header))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload.to_vec())
        .to_request();
    match test::try_call_service(&service, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

fn payment_succeeded(intent_id: &str, metadata: Value) -> Vec<u8> {
    json!({
        "id": format!("evt_{intent_id}"),
        "type": "payment_intent.succeeded",
        "created": Utc::now().timestamp(),
        "data": { "object": {
            "id": intent_id,
            "amount": 1500,
            "currency": "usd",
            "status": "succeeded",
            "metadata": metadata
        }}
    })
    .to_string()
    .into_bytes()
}

fn refund_created(refund_id: &str, status: &str, metadata: Value) -> Vec<u8> {
    json!({
        "id": format!("evt_{refund_id}"),
        "type": "refund.created",
        "created": Utc::now().timestamp(),
        "data": { "object": {
            "id": refund_id,
            "amount": 1500,
            "payment_intent": "pi_fake_1",
            "status": status,
            "metadata": metadata
        }}
    })
    .to_string()
    .into_bytes()
}

#[actix_web::test]
async fn unsigned_deliveries_are_refused() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let intent = srv.flow().create_payment_intent(&placed.code, None).await.unwrap();
    let payload = payment_succeeded(&intent.intent_id, json!({"order_id": placed.order.order_id}));

    let (status, body) = deliver(srv.flow(), &payload, Some("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid webhook delivery"), "{body}");

    let forged = sign_payload(&payload, "whsec_someone_else", Utc::now().timestamp()).unwrap();
    let (status, _) = deliver(srv.flow(), &payload, Some(&forged)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stale = sign_payload(&payload, SECRET, Utc::now().timestamp() - 3600).unwrap();
    let (status, _) = deliver(srv.flow(), &payload, Some(&stale)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let order = srv.db.fetch_order_by_order_id(&placed.order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Placed);
    srv.tear_down().await;
}

#[actix_web::test]
async fn captured_payments_mark_orders_as_paid_once() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let intent = srv.flow().create_payment_intent(&placed.code, None).await.unwrap();
    let payload =
        payment_succeeded(&intent.intent_id, json!({"order_id": placed.order.order_id, "payer_name": "Rosa Díaz"}));

    let (status, body) = deliver(srv.flow(), &payload, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, r#"{"success":true,"message":"Payment confirmed."}"#);

    let (status, body) = deliver(srv.flow(), &payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Payment already recorded."), "{body}");

    let order = srv.db.fetch_order_by_order_id(&placed.order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    let history = srv.db.fetch_status_history(&placed.order.order_id).await.unwrap();
    assert_eq!(history.iter().filter(|h| h.action == OrderStatusType::Paid).count(), 1);
    let payment = srv.db.fetch_payment_for_order(&placed.order.order_id).await.unwrap().unwrap();
    assert_eq!(payment.payer_name.as_deref(), Some("Rosa Díaz"));
    srv.tear_down().await;
}

#[actix_web::test]
async fn captures_for_cancelled_orders_are_acknowledged() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let intent = srv.flow().create_payment_intent(&placed.code, None).await.unwrap();
    srv.flow().cancel_order(&srv.fx.customer_actor(), &placed.order.order_id, None).await.unwrap();

    let payload = payment_succeeded(&intent.intent_id, json!({"order_id": placed.order.order_id}));
    let (status, body) = deliver(srv.flow(), &payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":false"#), "{body}");
    assert!(body.contains("must be refunded"), "{body}");
    let order = srv.db.fetch_order_by_order_id(&placed.order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancel);
    let payment = srv.db.fetch_payment_for_order(&placed.order.order_id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);

    let (status, body) = deliver(srv.flow(), &payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Payment already recorded."), "{body}");
    srv.tear_down().await;
}

#[actix_web::test]
async fn card_refunds_complete_when_the_processor_confirms_them() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let order_id = placed.order.order_id.clone();
    let intent = srv.flow().create_payment_intent(&placed.code, None).await.unwrap();
    let (status, _) = deliver(srv.flow(), &payment_succeeded(&intent.intent_id, json!({"order_id": order_id})), None).await;
    assert_eq!(status, StatusCode::OK);

    let outcome = srv.flow().refund_order(&srv.fx.staff_actor(), &order_id, Some("Out of stock")).await.unwrap();
    let refund_id = match outcome {
        RefundOutcome::Initiated { refund_id, order } => {
            assert_eq!(order.status, OrderStatusType::Paid);
            refund_id
        },
        RefundOutcome::Completed { .. } => panic!("Card refunds wait for the processor"),
    };

    let (status, body) = deliver(srv.flow(), &refund_created(&refund_id, "pending", json!({})), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("missing the order_id metadata"), "{body}");

    let (status, body) =
        deliver(srv.flow(), &refund_created(&refund_id, "failed", json!({"order_id": order_id, "actor_id": "carol"})), None)
            .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":false"#), "{body}");

    let metadata = json!({"order_id": order_id, "actor_id": "carol", "comment": "Out of stock"});
    let (status, body) = deliver(srv.flow(), &refund_created(&refund_id, "succeeded", metadata.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Refund recorded."), "{body}");
    let (status, body) = deliver(srv.flow(), &refund_created(&refund_id, "succeeded", metadata), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Refund already recorded."), "{body}");

    let order = srv.db.fetch_order_by_order_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Refund);
    let last = srv.db.fetch_status_history(&order_id).await.unwrap().pop().unwrap();
    assert_eq!(last.action, OrderStatusType::Refund);
    assert_eq!(last.actor_id, "carol");
    srv.tear_down().await;
}

#[actix_web::test]
async fn other_events_are_acknowledged() {
    let srv = TestServer::new().await;
    let payload = json!({
        "id": "evt_charge",
        "type": "charge.dispute.created",
        "data": { "object": { "id": "dp_1" } }
    })
    .to_string()
    .into_bytes();
    let (status, body) = deliver(srv.flow(), &payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Event type charge.dispute.created is not handled."), "{body}");

    let failed = json!({
        "id": "evt_failed",
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": "pi_fake_9", "amount": 1500, "currency": "usd", "status": "requires_payment_method"
        }}
    })
    .to_string()
    .into_bytes();
    let (status, body) = deliver(srv.flow(), &failed, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Payment failure noted."), "{body}");
    srv.tear_down().await;
}

#[actix_web::test]
async fn unreadable_events_are_bad_requests() {
    let srv = TestServer::new().await;
    let (status, _) = deliver(srv.flow(), b"{\"id\": 12", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let not_an_intent = json!({
        "id": "evt_odd",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_1" } }
    })
    .to_string()
    .into_bytes();
    let (status, body) = deliver(srv.flow(), &not_an_intent, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("is not a payment intent"), "{body}");
    srv.tear_down().await;
}
