//! Message templates for the emails and text messages sent as orders move through their lifecycle.
//!
//! Names, comments and anything else typed in by a user are escaped before they go into an email body.
use html_escape::encode_text;

use crate::{
    db_types::{Order, OrderStatusType, Patient, Payment, User},
    pricing::PriceBreakdown,
    traits::Notification,
};

/// Someone who hears about an order: the user who placed it, or the patient it is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<&User> for Recipient {
    fn from(user: &User) -> Self {
        Self { name: user.name.clone(), email: Some(user.email.clone()), phone: user.phone.clone() }
    }
}

impl From<&Patient> for Recipient {
    fn from(patient: &Patient) -> Self {
        Self { name: patient.name.clone(), email: patient.email.clone(), phone: patient.phone.clone() }
    }
}

impl Recipient {
    fn email(&self, subject: String, html_body: String) -> Option<Notification> {
        self.email.as_ref().filter(|e| !e.trim().is_empty()).map(|to| Notification::email(to, subject, html_body))
    }

    fn sms(&self, message: String) -> Option<Notification> {
        self.phone.as_ref().filter(|p| !p.trim().is_empty()).map(|to| Notification::sms(to, message))
    }
}

fn breakdown_html(b: &PriceBreakdown) -> String {
    format!(
        "<table><tr><td>Products</td><td>{}</td></tr><tr><td>Delivery</td><td>{}</td></tr><tr><th>Total</th><th>{}</th></tr></table>",
        b.subtotal, b.delivery, b.total
    )
}

/// Sent to the orderer, and to the patient when a doctor orders for one. Both get the code so either can pay.
pub fn order_placed(
    order: &Order,
    code: &str,
    breakdown: &PriceBreakdown,
    orderer: &Recipient,
    patient: Option<&Recipient>,
) -> Vec<Notification> {
    let mut result = Vec::with_capacity(4);
    let subject = format!("Order #{} received", order.id);
    let table = breakdown_html(breakdown);
    let for_whom = patient.map(|p| format!(" for {}", encode_text(&p.name))).unwrap_or_default();
    let body = format!(
        "<p>Hi {},</p><p>We have received your order #{}{for_whom}. Use the code <strong>{}</strong> to pay for \
         it or share it with someone who will.</p>{table}",
        encode_text(&orderer.name),
        order.id,
        encode_text(code)
    );
    result.extend(orderer.email(subject.clone(), body));
    result.extend(orderer.sms(format!("Order #{} received. Total {}. Payment code: {code}", order.id, breakdown.total)));
    if let Some(patient) = patient {
        let body = format!(
            "<p>Hi {},</p><p>{} has ordered medication for you (order #{}). Use the code <strong>{}</strong> to \
             pay for it.</p>{table}",
            encode_text(&patient.name),
            encode_text(&orderer.name),
            order.id,
            encode_text(code)
        );
        result.extend(patient.email(subject, body));
        result.extend(patient.sms(format!(
            "{} ordered medication for you (#{}). Total {}. Payment code: {code}",
            orderer.name, order.id, breakdown.total
        )));
    }
    result
}

/// The email sent when an order is fulfilled, rejected, cancelled or refunded.
pub fn status_changed(
    order: &Order,
    status: OrderStatusType,
    comment: Option<&str>,
    recipient: &Recipient,
) -> Option<Notification> {
    let (subject, summary) = match status {
        OrderStatusType::Fulfilled => ("is on its way", "has been prepared and is on its way to you.".to_string()),
        OrderStatusType::Reject => (
            "was rejected",
            format!("was rejected by the pharmacy. Reason: {}", encode_text(comment.unwrap_or("no reason given"))),
        ),
        OrderStatusType::Cancel => ("was cancelled", "has been cancelled.".to_string()),
        OrderStatusType::Refund => ("was refunded", format!("has been refunded. {} will be returned to you.", order.total_price)),
        OrderStatusType::Paid => ("is paid", "has been paid.".to_string()),
        OrderStatusType::Placed => ("was received", "has been received.".to_string()),
    };
    let body = format!("<p>Hi {},</p><p>Your order #{} {summary}</p>", encode_text(&recipient.name), order.id);
    recipient.email(format!("Order #{} {subject}", order.id), body)
}

/// When a patient exists both the patient and the ordering user hear about the payment, with different wording.
pub fn payment_received(
    order: &Order,
    payment: &Payment,
    orderer: &Recipient,
    patient: Option<&Recipient>,
) -> Vec<Notification> {
    let subject = format!("Payment received for order #{}", order.id);
    let payer = payment.payer_name.as_deref().map(|n| format!(" by {}", encode_text(n))).unwrap_or_default();
    let mut result = Vec::with_capacity(2);
    match patient {
        Some(patient) => {
            let body = format!(
                "<p>Hi {},</p><p>The medication {} ordered for you (order #{}) has been paid{payer}. We will let you \
                 know when it ships.</p>",
                encode_text(&patient.name),
                encode_text(&orderer.name),
                order.id
            );
            result.extend(patient.email(subject.clone(), body));
            let body = format!(
                "<p>Hi {},</p><p>Order #{} for {} has been paid{payer} ({}).</p>",
                encode_text(&orderer.name),
                order.id,
                encode_text(&patient.name),
                payment.amount
            );
            result.extend(orderer.email(subject, body));
        },
        None => {
            let body = format!(
                "<p>Hi {},</p><p>We have received {} for order #{}{payer}. We will let you know when it ships.</p>",
                encode_text(&orderer.name),
                payment.amount,
                order.id
            );
            result.extend(orderer.email(subject, body));
        },
    }
    result
}
