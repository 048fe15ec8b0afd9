use cucumber::{then, when};
use pharmacy_engine::{
    db_types::{OrderStatusType, PaymentCapture, PaymentMethod},
    order_objects::NewOrder,
    OrderManagement,
};

use crate::cucumber::PharmacyWorld;

fn record<T, E: std::fmt::Display>(world: &mut PharmacyWorld, result: Result<T, E>) {
    world.last_error = result.err().map(|e| e.to_string());
}

#[when(expr = "{word} places order {word} for {int} {word}")]
async fn place_order(world: &mut PharmacyWorld, who: String, label: String, quantity: i64, product: String) {
    let actor = world.actor(&who);
    let order = NewOrder::new(world.address_of(&who)).with_item(world.product(&product).id, quantity);
    let placed = world.system().api.place_order(&actor, order).await.expect("Error placing order");
    world.orders.insert(label, placed);
}

#[when(expr = "the processor captures payment for order {word}")]
async fn capture_payment(world: &mut PharmacyWorld, label: String) {
    let code = world.order(&label).code.clone();
    let api = &world.system().api;
    let intent = match world.order(&label).order.status {
        OrderStatusType::Placed => api.create_payment_intent(&code, None).await.ok(),
        _ => None,
    };
    // Redeliveries reuse the intent already stored against the order
    let intent_id = match intent {
        Some(intent) => intent.intent_id,
        None => {
            let order_id = &world.order(&label).order.order_id;
            let payment = world.system().db.fetch_payment_for_order(order_id).await.expect("Error fetching payment");
            payment.and_then(|p| p.intent_id).expect("There is no card payment for the order")
        },
    };
    let result = world.system().api.confirm_payment(PaymentCapture::new(intent_id)).await;
    record(world, result);
}

#[when(expr = "carol records a {word} payment for order {word}")]
async fn offline_payment(world: &mut PharmacyWorld, method: String, label: String) {
    let method = method.parse::<PaymentMethod>().expect("Not a payment method");
    let order_id = world.order(&label).order.order_id.clone();
    let actor = world.actor("carol");
    let result = world.system().api.record_offline_payment(&actor, &order_id, method, None).await;
    record(world, result);
}

#[when(expr = "{word} fulfils order {word}")]
async fn fulfil(world: &mut PharmacyWorld, who: String, label: String) {
    let order_id = world.order(&label).order.order_id.clone();
    let result = world.system().api.fulfill_order(&world.actor(&who), &order_id).await;
    record(world, result);
}

#[when(expr = "{word} rejects order {word} because {string}")]
async fn reject(world: &mut PharmacyWorld, who: String, label: String, reason: String) {
    let order_id = world.order(&label).order.order_id.clone();
    let result = world.system().api.reject_order(&world.actor(&who), &order_id, &reason).await;
    record(world, result);
}

#[when(expr = "{word} cancels order {word}")]
async fn cancel(world: &mut PharmacyWorld, who: String, label: String) {
    let order_id = world.order(&label).order.order_id.clone();
    let result = world.system().api.cancel_order(&world.actor(&who), &order_id, None).await;
    record(world, result);
}

#[when(expr = "{word} refunds order {word}")]
async fn refund(world: &mut PharmacyWorld, who: String, label: String) {
    let order_id = world.order(&label).order.order_id.clone();
    let result = world.system().api.refund_order(&world.actor(&who), &order_id, None).await;
    record(world, result);
}

#[when(expr = "the processor confirms the refund for order {word}")]
async fn confirm_refund(world: &mut PharmacyWorld, label: String) {
    let order_id = world.order(&label).order.order_id.clone();
    let result = world.system().api.confirm_refund(&order_id, "carol", None).await;
    record(world, result);
}

#[when(expr = "the processor stops accepting refunds")]
async fn refunds_fail(world: &mut PharmacyWorld) {
    world.system().processor.set_refund_status("failed");
}

#[then(expr = "order {word} costs {word} including {word} delivery")]
async fn check_price(world: &mut PharmacyWorld, label: String, total: String, delivery: String) {
    let order = &world.order(&label).order;
    assert_eq!(order.total_price.to_string(), total, "Total price is incorrect");
    assert_eq!(order.delivery_price.to_string(), delivery, "Delivery price is incorrect");
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut PharmacyWorld, label: String, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not an order status");
    let order_id = &world.order(&label).order.order_id;
    let order = world.system().db.fetch_order_by_order_id(order_id).await.expect("Error fetching order");
    assert_eq!(order.map(|o| o.status), Some(expected));
}

#[then(expr = "order {word} has {int} {word} entr(y)(ies) in its history")]
async fn check_history(world: &mut PharmacyWorld, label: String, count: usize, action: String) {
    let action = action.parse::<OrderStatusType>().expect("Not an order status");
    let order_id = &world.order(&label).order.order_id;
    let history = world.system().db.fetch_status_history(order_id).await.expect("Error fetching history");
    assert_eq!(history.iter().filter(|h| h.action == action).count(), count);
}

#[then(expr = "the last action succeeded")]
async fn check_success(world: &mut PharmacyWorld) {
    assert_eq!(world.last_error, None);
}

#[then(expr = "the last action failed with {string}")]
async fn check_failure(world: &mut PharmacyWorld, message: String) {
    let error = world.last_error.as_deref().expect("The last action succeeded");
    assert!(error.contains(&message), "Expected '{message}' in '{error}'");
}
