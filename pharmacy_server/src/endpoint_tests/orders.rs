use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use pharmacy_engine::{
    db_types::{Actor, Money, Order, OrderId, OrderItem, OrderStatusType, Role},
    order_objects::GuestOrderView,
    OrdersApi,
};
use serde_json::json;

use super::helpers::{get_request, post_request};
use crate::{
    endpoint_tests::mocks::MockOrderManager,
    routes::{GuestOrderRoute, MyOrdersRoute, OrderDetailsRoute, SearchOrdersRoute},
};

#[actix_web::test]
async fn my_orders_need_an_identity() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(None, "/orders", configure(MockOrderManager::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"No user identity was provided with the request."}"#);
}

#[actix_web::test]
async fn users_see_their_own_orders() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_orders_for_user()
        .withf(|user_id| user_id == "alice")
        .times(1)
        .returning(|_| Ok(vec![order(2, "alice", OrderStatusType::Paid), order(1, "alice", OrderStatusType::Placed)]));
    let alice = Actor::new("alice", Role::User);
    let (status, body) = get_request(Some(&alice), "/orders", configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, 2);
    assert_eq!(orders[0].status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn staff_see_every_order_newest_first() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_search_orders()
        .times(1)
        .returning(|_| Ok(vec![order(1, "alice", OrderStatusType::Placed), order(2, "drbob", OrderStatusType::Paid)]));
    let carol = Actor::new("carol", Role::Staff);
    let (status, body) = get_request(Some(&carol), "/orders", configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.iter().map(|o| o.id).collect::<Vec<_>>(), vec![2, 1]);
}

#[actix_web::test]
async fn only_staff_search_orders() {
    let _ = env_logger::try_init().ok();
    let alice = Actor::new("alice", Role::User);
    let (status, body) =
        post_request(Some(&alice), "/orders/search", json!({"status": ["PAID"]}), configure(MockOrderManager::new()))
            .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Insufficient Permissions"));

    let mut db = MockOrderManager::new();
    db.expect_search_orders()
        .withf(|q| q.status == Some(vec![OrderStatusType::Paid]) && q.user_id.as_deref() == Some("alice"))
        .times(1)
        .returning(|_| Ok(vec![order(2, "alice", OrderStatusType::Paid)]));
    let admin = Actor::new("root", Role::Admin);
    let (status, body) =
        post_request(Some(&admin), "/orders/search", json!({"status": ["PAID"], "user_id": "alice"}), configure(db))
            .await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
}

#[actix_web::test]
async fn other_peoples_orders_are_hidden() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_order_id()
        .withf(|order_id| order_id.as_str() == "ord_1")
        .returning(|_| Ok(Some(order(1, "drbob", OrderStatusType::Placed))));
    let alice = Actor::new("alice", Role::User);
    let (status, body) = get_request(Some(&alice), "/orders/ord_1", configure(db)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("belongs to someone else"));
}

#[actix_web::test]
async fn guests_see_orders_by_code() {
    let _ = env_logger::try_init().ok();
    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_code()
        .withf(|code| code == "K3XQ")
        .returning(|_| Ok(Some(order(5, "alice", OrderStatusType::Placed))));
    db.expect_fetch_order_items().returning(|_| Ok(vec![item(5)]));
    let (status, body) = get_request(None, "/pay/K3XQ", configure(db)).await;
    assert_eq!(status, StatusCode::OK);
    let view: GuestOrderView = serde_json::from_str(&body).unwrap();
    assert_eq!(view.order_number, 5);
    assert_eq!(view.total_price, Money::from_cents(1500));
    assert_eq!(view.items.len(), 1);
    assert!(view.payable);
    assert!(!body.contains("alice"));

    let mut db = MockOrderManager::new();
    db.expect_fetch_order_by_code().returning(|_| Ok(None));
    let (status, body) = get_request(None, "/pay/ZZZZ", configure(db)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("There is no order with code ZZZZ"));
}

fn configure(db: MockOrderManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(GuestOrderRoute::<MockOrderManager>::new())
            .service(SearchOrdersRoute::<MockOrderManager>::new())
            .service(MyOrdersRoute::<MockOrderManager>::new())
            .service(OrderDetailsRoute::<MockOrderManager>::new())
            .app_data(web::Data::new(OrdersApi::new(db)));
    }
}

fn order(id: i64, user_id: &str, status: OrderStatusType) -> Order {
    Order {
        id,
        order_id: OrderId(format!("ord_{id}")),
        user_id: user_id.to_string(),
        patient_id: None,
        address_id: 1,
        status,
        total_price: Money::from_cents(1500),
        delivery_price: Money::from_cents(500),
        created_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap(),
    }
}

fn item(order_number: i64) -> OrderItem {
    OrderItem {
        id: 1,
        order_id: OrderId(format!("ord_{order_number}")),
        product_id: 1,
        quantity: 2,
        name: "Paracetamol 500mg".to_string(),
        price: Money::from_cents(500),
        image: None,
        requires_prescription: false,
        weight: 0.5,
    }
}
