//! Order actions over HTTP against a throw-away SQLite store, with a fake card processor and notifier.
use actix_web::{http::StatusCode, web, web::ServiceConfig};
use pharmacy_engine::{
    db_types::{Money, OrderStatusType},
    events::EventProducers,
    order_objects::{NewOrder, OrderDetails, PaymentIntentResult, PlacedOrder},
    test_utils::{
        fakes::{FakeNotifier, FakePaymentProcessor},
        prepare_env::{prepare_test_env, random_db_path, tear_down},
        seed::{seed_catalog, Fixtures},
    },
    OrderFlowApi,
    OrdersApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::helpers::{get_request, post_request};
use crate::routes::{
    CancelOrderRoute,
    ConfirmPaymentReturnRoute,
    CreatePaymentIntentRoute,
    FulfilOrderRoute,
    GuestOrderRoute,
    OrderDetailsRoute,
    PlaceOrderRoute,
    RecordPaymentRoute,
    RefundOrderRoute,
    RejectOrderRoute,
};

type Db = SqliteDatabase;
type Processor = FakePaymentProcessor;
type Mailer = FakeNotifier;

pub struct TestServer {
    pub db: SqliteDatabase,
    pub processor: FakePaymentProcessor,
    pub notifier: FakeNotifier,
    pub fx: Fixtures,
}

impl TestServer {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let fx = seed_catalog(&db).await;
        Self { db, processor: FakePaymentProcessor::new(), notifier: FakeNotifier::new(), fx }
    }

    pub fn flow(&self) -> OrderFlowApi<Db, Processor, Mailer> {
        OrderFlowApi::new(self.db.clone(), self.processor.clone(), self.notifier.clone(), EventProducers::default())
    }

    pub fn routes(&self) -> impl FnOnce(&mut ServiceConfig) {
        let flow = self.flow();
        let orders = OrdersApi::new(self.db.clone());
        move |cfg| {
            cfg.app_data(web::Data::new(flow))
                .app_data(web::Data::new(orders))
                .service(ConfirmPaymentReturnRoute::<Db, Processor, Mailer>::new())
                .service(GuestOrderRoute::<Db>::new())
                .service(CreatePaymentIntentRoute::<Db, Processor, Mailer>::new())
                .service(PlaceOrderRoute::<Db, Processor, Mailer>::new())
                .service(OrderDetailsRoute::<Db>::new())
                .service(FulfilOrderRoute::<Db, Processor, Mailer>::new())
                .service(RejectOrderRoute::<Db, Processor, Mailer>::new())
                .service(CancelOrderRoute::<Db, Processor, Mailer>::new())
                .service(RefundOrderRoute::<Db, Processor, Mailer>::new())
                .service(RecordPaymentRoute::<Db, Processor, Mailer>::new());
        }
    }

    /// Two packs of paracetamol to the customer's address in La Habana: $10.00 plus $5.00 delivery
    pub async fn place_customer_order(&self) -> PlacedOrder {
        let order = NewOrder::new(self.fx.customer_address.id).with_item(self.fx.paracetamol.id, 2);
        self.flow().place_order(&self.fx.customer_actor(), order).await.expect("Error placing order")
    }

    pub async fn tear_down(self) {
        tear_down(self.db).await;
    }
}

#[actix_web::test]
async fn orders_move_through_their_lifecycle() {
    let srv = TestServer::new().await;
    let customer = srv.fx.customer_actor();
    let staff = srv.fx.staff_actor();
    let new_order = json!({
        "address_id": srv.fx.customer_address.id,
        "items": [{"product_id": srv.fx.paracetamol.id, "quantity": 2}]
    });
    let (status, body) = post_request(Some(&customer), "/orders", new_order, srv.routes()).await;
    assert_eq!(status, StatusCode::CREATED);
    let placed: PlacedOrder = serde_json::from_str(&body).unwrap();
    assert_eq!(placed.order.total_price, Money::from_cents(1500));
    assert_eq!(placed.order.delivery_price, Money::from_cents(500));
    assert_eq!(placed.code.len(), 4);
    let order_id = placed.order.order_id.as_str().to_string();

    let fulfil = format!("/orders/{order_id}/fulfil");
    let (status, _) = post_request(Some(&customer), &fulfil, json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = post_request(Some(&staff), &fulfil, json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("cannot move from PLACED to FULFILLED"), "{body}");

    let payment = format!("/orders/{order_id}/payment");
    let (status, body) =
        post_request(Some(&staff), &payment, json!({"method": "CASH", "payer_name": "Rosa"}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let paid: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(paid["order"]["status"], "PAID");
    assert_eq!(paid["payment"]["method"], "CASH");

    let (status, _) = post_request(Some(&staff), &fulfil, json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get_request(Some(&customer), &format!("/orders/{order_id}"), srv.routes()).await;
    assert_eq!(status, StatusCode::OK);
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.order.status, OrderStatusType::Fulfilled);
    let actions = details.history.iter().map(|h| h.action).collect::<Vec<_>>();
    assert_eq!(actions, vec![OrderStatusType::Placed, OrderStatusType::Paid, OrderStatusType::Fulfilled]);
    assert_eq!(details.code, Some(placed.code));
    srv.tear_down().await;
}

#[actix_web::test]
async fn invalid_orders_are_bad_requests() {
    let srv = TestServer::new().await;
    let customer = srv.fx.customer_actor();
    let rx_only = json!({
        "address_id": srv.fx.customer_address.id,
        "items": [{"product_id": srv.fx.amoxicillin.id, "quantity": 1}]
    });
    let (status, body) = post_request(Some(&customer), "/orders", rx_only, srv.routes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let no_such_address = json!({
        "address_id": 9999,
        "items": [{"product_id": srv.fx.paracetamol.id, "quantity": 1}]
    });
    let (status, _) = post_request(Some(&customer), "/orders", no_such_address, srv.routes()).await;
    assert!(status.is_client_error());
    let (status, _) = post_request(None, "/orders", json!({"address_id": 1, "items": []}), srv.routes()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    srv.tear_down().await;
}

#[actix_web::test]
async fn cancelling_and_rejecting() {
    let srv = TestServer::new().await;
    let first = srv.place_customer_order().await;
    let second = srv.place_customer_order().await;

    let cancel = format!("/orders/{}/cancel", first.order.order_id);
    let (status, _) = post_request(Some(&srv.fx.doctor_actor()), &cancel, json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) =
        post_request(Some(&srv.fx.customer_actor()), &cancel, json!({"comment": "Found it locally"}), srv.routes())
            .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"CANCEL""#), "{body}");

    let reject = format!("/orders/{}/reject", second.order.order_id);
    let (status, body) = post_request(Some(&srv.fx.staff_actor()), &reject, json!({"reason": "  "}), srv.routes()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("A reason is required"));
    let (status, _) =
        post_request(Some(&srv.fx.staff_actor()), &reject, json!({"reason": "Out of stock"}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
        post_request(Some(&srv.fx.staff_actor()), &reject, json!({"reason": "Out of stock"}), srv.routes()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    srv.tear_down().await;
}

#[actix_web::test]
async fn offline_payments_are_refunded_on_the_spot() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let staff = srv.fx.staff_actor();
    let order_id = placed.order.order_id.to_string();
    let refund = format!("/orders/{order_id}/refund");
    let (status, _) = post_request(Some(&staff), &refund, json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let payment = format!("/orders/{order_id}/payment");
    let (status, _) = post_request(Some(&staff), &payment, json!({"method": "TRANSFER"}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post_request(Some(&staff), &refund, json!({"comment": "Duplicate order"}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["result"], "completed");
    assert_eq!(outcome["order"]["status"], "REFUND");
    assert!(srv.processor.refund_requests().is_empty());
    srv.tear_down().await;
}

#[actix_web::test]
async fn guests_pay_by_card_with_the_order_code() {
    let srv = TestServer::new().await;
    let placed = srv.place_customer_order().await;
    let code = placed.code.to_lowercase();

    let (status, body) = get_request(None, &format!("/pay/{code}"), srv.routes()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""payable":true"#), "{body}");

    let (status, body) =
        post_request(None, &format!("/pay/{code}/intent"), json!({"payer_name": "Rosa"}), srv.routes()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let intent: PaymentIntentResult = serde_json::from_str(&body).unwrap();
    assert_eq!(intent.amount, Money::from_cents(1500));
    assert_eq!(intent.order_id, placed.order.order_id);
    let requests = srv.processor.intent_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payer_name.as_deref(), Some("Rosa"));

    // The browser is back before the card has been charged
    let confirm = json!({"intent_id": intent.intent_id});
    let (status, body) = post_request(None, "/pay/confirm", confirm.clone(), srv.routes()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("has not completed"), "{body}");

    srv.processor.set_intent_status(&intent.intent_id, "succeeded");
    let (status, body) = post_request(None, "/pay/confirm", confirm.clone(), srv.routes()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["order"]["status"], "PAID");
    assert_eq!(result["duplicate"], false);

    let (status, body) = post_request(None, "/pay/confirm", confirm, srv.routes()).await;
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["duplicate"], true);

    let (status, body) = post_request(None, &format!("/pay/{code}/intent"), json!({}), srv.routes()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("has already been paid"), "{body}");
    srv.tear_down().await;
}
