use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
};

use log::*;

use crate::{
    db_types::{
        Actor,
        Order,
        OrderId,
        OrderStatusType,
        Payment,
        PaymentCapture,
        PaymentMethod,
        PaymentStatus,
        Product,
        Role,
    },
    events::{EventProducers, NewOrderEvent, OrderStatusEvent, PaymentEvent},
    helpers::new_order_id,
    pe_api::{
        errors::OrderFlowError,
        notifications::{self, Recipient},
        order_objects::{NewOrder, PaymentIntentResult, PlacedOrder, RefundOutcome, MAX_ITEM_QUANTITY},
    },
    pricing::{price_breakdown, PriceLine},
    traits::{
        IntentRequest,
        NewOrderItemRecord,
        NewOrderRecord,
        Notification,
        Notifier,
        PaymentConfirmation,
        PaymentProcessor,
        PharmacyDatabase,
        RefundRecord,
        RefundRequest,
    },
};

/// `OrderFlowApi` drives orders through their lifecycle, whether the trigger is a customer, a member of staff or the
/// payment processor.
///
/// Every state change is a single guarded write in the store. Emails, text messages and live-update events follow
/// once the change has been committed; they are best-effort and a failure to deliver one never undoes the change.
pub struct OrderFlowApi<B, P, N> {
    db: B,
    processor: P,
    notifier: N,
    producers: EventProducers,
}

impl<B, P, N> Debug for OrderFlowApi<B, P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, P, N> OrderFlowApi<B, P, N> {
    pub fn new(db: B, processor: P, notifier: N, producers: EventProducers) -> Self {
        Self { db, processor, notifier, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P, N> OrderFlowApi<B, P, N>
where
    B: PharmacyDatabase,
    P: PaymentProcessor,
    N: Notifier,
{
    /// Validates and stores a new order.
    ///
    /// Everything is checked before anything is written: the patient (doctors only), the delivery address, that every
    /// product exists, and that a prescription has been uploaded if any product needs one. Prices are snapshotted
    /// from the catalog and the delivery fee is worked out from the address's province and the total weight.
    pub async fn place_order(&self, actor: &Actor, order: NewOrder) -> Result<PlacedOrder, OrderFlowError> {
        if order.items.is_empty() {
            return Err(OrderFlowError::Validation("An order must contain at least one product".into()));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
            return Err(OrderFlowError::Validation(format!(
                "The quantity of product {} must be at least 1, not {}",
                item.product_id, item.quantity
            )));
        }
        if let Some(item) = order.items.iter().find(|i| i.quantity > MAX_ITEM_QUANTITY) {
            return Err(OrderFlowError::Validation(format!(
                "At most {MAX_ITEM_QUANTITY} units of product {} can be ordered, not {}",
                item.product_id, item.quantity
            )));
        }
        let patient = match &order.patient_id {
            Some(patient_id) => {
                if actor.role != Role::Doctor {
                    return Err(OrderFlowError::Forbidden("Only doctors can order on behalf of a patient".into()));
                }
                let patient = self
                    .db
                    .fetch_patient(patient_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::NotFound(format!("Patient {patient_id}")))?;
                if patient.doctor_id != actor.user_id {
                    return Err(OrderFlowError::Forbidden(format!("{patient_id} is not one of your patients")));
                }
                Some(patient)
            },
            None => None,
        };
        let user = self
            .db
            .fetch_user(&actor.user_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("User {}", actor.user_id)))?;
        let address = self
            .db
            .fetch_delivery_address(order.address_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("Delivery address {}", order.address_id)))?;
        let owns_address = address.user_id.as_deref() == Some(actor.user_id.as_str()) ||
            matches!((&patient, &address.patient_id), (Some(p), Some(pid)) if &p.id == pid);
        if !owns_address {
            return Err(OrderFlowError::Validation(format!(
                "Delivery address {} cannot be used for this order",
                order.address_id
            )));
        }
        // The same product may appear on several cart lines
        let mut quantities = BTreeMap::<i64, i64>::new();
        for item in &order.items {
            let quantity = quantities.entry(item.product_id).or_default();
            *quantity = quantity
                .checked_add(item.quantity)
                .filter(|q| *q <= MAX_ITEM_QUANTITY)
                .ok_or_else(|| {
                    OrderFlowError::Validation(format!(
                        "At most {MAX_ITEM_QUANTITY} units of product {} can be ordered",
                        item.product_id
                    ))
                })?;
        }
        let ids = quantities.keys().copied().collect::<Vec<i64>>();
        let products = self.db.fetch_products(&ids).await?;
        let products = products.iter().map(|p| (p.id, p)).collect::<HashMap<i64, &Product>>();
        let mut items = Vec::with_capacity(quantities.len());
        for (id, quantity) in quantities {
            let product = products.get(&id).ok_or_else(|| OrderFlowError::NotFound(format!("Product {id}")))?;
            items.push(NewOrderItemRecord::snapshot(product, quantity));
        }
        let prescription_url =
            order.prescription_url.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        if prescription_url.is_none() {
            let needs_rx = items.iter().filter(|i| i.requires_prescription).map(|i| i.name.as_str()).collect::<Vec<_>>();
            if !needs_rx.is_empty() {
                return Err(OrderFlowError::Validation(format!(
                    "A prescription must be uploaded to order {}",
                    needs_rx.join(", ")
                )));
            }
        }
        let lines = items.iter().map(|i| PriceLine::new(i.price, i.weight, i.quantity)).collect::<Vec<_>>();
        let breakdown = price_breakdown(&address.province, &lines)?;
        let record = NewOrderRecord {
            order_id: new_order_id(),
            user_id: actor.user_id.clone(),
            patient_id: patient.as_ref().map(|p| p.id.clone()),
            address_id: address.id,
            total_price: breakdown.total,
            delivery_price: breakdown.delivery,
            items,
            prescription_url,
        };
        let (order, code) = self.db.insert_order(record).await?;
        info!(
            "🛒️ Order #{} [{}] placed by {} ({}). Total {}",
            order.id, order.order_id, actor.user_id, actor.role, order.total_price
        );
        let orderer = Recipient::from(&user);
        let patient = patient.as_ref().map(Recipient::from);
        let messages = notifications::order_placed(&order, &code.code, &breakdown, &orderer, patient.as_ref());
        self.notify_all(messages).await;
        self.producers.publish_new_order(NewOrderEvent::new(order.clone())).await;
        Ok(PlacedOrder { order, code: code.code, breakdown })
    }

    /// Marks a paid order as fulfilled. Staff only.
    pub async fn fulfill_order(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        require_staff(actor, "fulfil orders")?;
        self.transition(actor, order_id, OrderStatusType::Fulfilled, None).await
    }

    /// Rejects a placed or paid order. Staff only, and a reason must be given.
    pub async fn reject_order(&self, actor: &Actor, order_id: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        require_staff(actor, "reject orders")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderFlowError::Validation("A reason is required to reject an order".into()));
        }
        self.transition(actor, order_id, OrderStatusType::Reject, Some(reason)).await
    }

    /// Cancels a placed or paid order. Only the user who placed the order may cancel it.
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        comment: Option<&str>,
    ) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.user_id != actor.user_id {
            return Err(OrderFlowError::Forbidden("Only the user who placed an order can cancel it".into()));
        }
        self.transition(actor, order_id, OrderStatusType::Cancel, comment).await
    }

    async fn transition(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        target: OrderStatusType,
        comment: Option<&str>,
    ) -> Result<Order, OrderFlowError> {
        let (order, old_status) =
            self.db.transition_order(order_id, target, &actor.user_id, comment).await.map_err(|e| {
                debug!("🔄️ {target} for {order_id} refused: {e}");
                OrderFlowError::from(e)
            })?;
        info!("🔄️ Order #{} [{order_id}] moved from {old_status} to {target} by {}", order.id, actor.user_id);
        self.after_transition(&order, old_status, &actor.user_id, comment).await;
        Ok(order)
    }

    async fn after_transition(&self, order: &Order, old_status: OrderStatusType, actor_id: &str, comment: Option<&str>) {
        let (orderer, patient) = self.recipients(order).await;
        if let Some(recipient) = patient.or(orderer) {
            let message = notifications::status_changed(order, order.status, comment, &recipient);
            self.notify_all(message.into_iter().collect()).await;
        }
        let event = OrderStatusEvent::new(order.clone(), actor_id.to_string())
            .with_old_status(old_status)
            .with_comment(comment.map(String::from));
        self.producers.publish_status_update(event).await;
    }

    /// Refunds an order that is PAID, or was paid and then cancelled or rejected. Staff only.
    ///
    /// Card payments are refunded through the processor, and the order is only marked refunded once the processor
    /// confirms the refund with a `refund.created` callback (see [`Self::confirm_refund`]). If the processor does not
    /// accept the refund, nothing changes. Offline payments are marked refunded immediately.
    pub async fn refund_order(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        comment: Option<&str>,
    ) -> Result<RefundOutcome, OrderFlowError> {
        require_staff(actor, "refund orders")?;
        let order = self.fetch_order(order_id).await?;
        if !order.status.can_transition_to(OrderStatusType::Refund) {
            return Err(OrderFlowError::IllegalState(format!(
                "Order #{} is {} and cannot be refunded",
                order.id, order.status
            )));
        }
        let payment = self
            .db
            .fetch_payment_for_order(order_id)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("There is no payment for order #{}", order.id)))?;
        match payment.status {
            PaymentStatus::Paid => {},
            PaymentStatus::Pending => {
                return Err(OrderFlowError::IllegalState(format!("Order #{} has not been paid", order.id)))
            },
            PaymentStatus::Refund => {
                return Err(OrderFlowError::IllegalState(format!("Order #{} has already been refunded", order.id)))
            },
        }
        if payment.method.is_gateway() {
            let intent_id = payment.intent_id.clone().ok_or_else(|| {
                OrderFlowError::IllegalState(format!("The card payment for order #{} has no intent id", order.id))
            })?;
            let request = RefundRequest {
                intent_id,
                order_id: order_id.clone(),
                actor_id: actor.user_id.clone(),
                comment: comment.map(String::from),
            };
            let refund = self.processor.create_refund(request).await.map_err(|e| {
                warn!("💳️ Refund for order #{} failed: {e}", order.id);
                OrderFlowError::from(e)
            })?;
            if !refund.is_succeeded() {
                warn!("💳️ Refund {} for order #{} has status {}", refund.refund_id, order.id, refund.status);
                return Err(OrderFlowError::Gateway(format!(
                    "The refund for order #{} was not accepted (status: {})",
                    order.id, refund.status
                )));
            }
            info!("💳️ Refund {} for order #{} initiated by {}. Awaiting confirmation.", refund.refund_id, order.id, actor.user_id);
            Ok(RefundOutcome::Initiated { refund_id: refund.refund_id, order })
        } else {
            match self.db.record_refund(order_id, &actor.user_id, comment).await? {
                RefundRecord::Refunded { order, old_status } => {
                    info!("💸️ Order #{} ({} payment) refunded by {}", order.id, payment.method, actor.user_id);
                    self.after_transition(&order, old_status, &actor.user_id, comment).await;
                    Ok(RefundOutcome::Completed { order })
                },
                RefundRecord::AlreadyRefunded { order } => Err(OrderFlowError::IllegalState(format!(
                    "Order #{} has already been refunded",
                    order.id
                ))),
            }
        }
    }

    /// Completes a card refund once the processor has confirmed it. Safe to call any number of times for the same
    /// order: only the first call changes anything.
    pub async fn confirm_refund(
        &self,
        order_id: &OrderId,
        actor_id: &str,
        comment: Option<&str>,
    ) -> Result<RefundRecord, OrderFlowError> {
        let record = self.db.record_refund(order_id, actor_id, comment).await?;
        match &record {
            RefundRecord::Refunded { order, old_status } => {
                info!("💸️ Refund for order #{} [{order_id}] confirmed", order.id);
                self.after_transition(order, *old_status, actor_id, comment).await;
            },
            RefundRecord::AlreadyRefunded { order } => {
                debug!("💸️ Refund for order #{} was already recorded. Nothing to do.", order.id);
            },
        }
        Ok(record)
    }

    /// Starts a card payment for the order with the given code.
    ///
    /// Calling this again for an unpaid order replaces the previous intent on the same payment record.
    pub async fn create_payment_intent(
        &self,
        code: &str,
        payer_name: Option<String>,
    ) -> Result<PaymentIntentResult, OrderFlowError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(OrderFlowError::Validation("An order code is required".into()));
        }
        let order = self
            .db
            .fetch_order_by_code(code)
            .await?
            .ok_or_else(|| OrderFlowError::NotFound(format!("There is no order with code {code}")))?;
        match order.status {
            OrderStatusType::Placed => {},
            OrderStatusType::Paid => {
                return Err(OrderFlowError::IllegalState(format!("Order #{} has already been paid", order.id)))
            },
            status => {
                return Err(OrderFlowError::IllegalState(format!("Order #{} is {status} and cannot be paid", order.id)))
            },
        }
        let request = IntentRequest {
            order_id: order.order_id.clone(),
            order_code: code.to_ascii_uppercase(),
            order_number: order.id,
            amount: order.total_price,
            payer_name: payer_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        };
        let intent = self.processor.create_intent(request).await?;
        let payment = self
            .db
            .upsert_payment_intent(&order.order_id, &intent.intent_id, &intent.client_secret, order.total_price)
            .await?;
        debug!("💳️ Payment intent {} created for order #{}", intent.intent_id, order.id);
        Ok(PaymentIntentResult {
            order_id: order.order_id,
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            amount: payment.amount,
        })
    }

    /// Marks an order paid once the processor has captured the payment. Repeat confirmations are harmless no-ops.
    ///
    /// Money captured for an order that was already cancelled or rejected is recorded against the order's payment so
    /// that staff can refund it with [`Self::refund_order`].
    pub async fn confirm_payment(&self, capture: PaymentCapture) -> Result<PaymentConfirmation, OrderFlowError> {
        let intent_id = capture.intent_id.clone();
        let result = self.db.confirm_payment(capture).await?;
        match &result {
            PaymentConfirmation::Confirmed { order, payment } => {
                info!("💰️ Payment {intent_id} confirmed. Order #{} [{}] is paid", order.id, order.order_id);
                self.after_payment(order, payment).await;
            },
            PaymentConfirmation::AlreadyPaid { order } => {
                debug!("💰️ Order #{} was already paid. Confirmation for {intent_id} ignored.", order.id);
            },
            PaymentConfirmation::CapturedAfterClose { order, payment } => {
                warn!(
                    "💰️ Payment {intent_id} of {} arrived after order #{} was {}. It is waiting to be refunded.",
                    payment.amount, order.id, order.status
                );
            },
        }
        Ok(result)
    }

    /// The browser's report that a card payment went through. The processor is asked for the intent's status before
    /// anything is changed.
    pub async fn confirm_payment_return(&self, intent_id: &str) -> Result<PaymentConfirmation, OrderFlowError> {
        let intent = self.processor.fetch_intent(intent_id).await?;
        if !intent.is_succeeded() {
            return Err(OrderFlowError::IllegalState(format!(
                "Payment {intent_id} has not completed (status: {})",
                intent.status
            )));
        }
        let capture = PaymentCapture {
            intent_id: intent.intent_id,
            order_id: intent.order_id,
            payer_name: intent.payer_name,
        };
        self.confirm_payment(capture).await
    }

    /// Records a cash or bank transfer payment for a placed order. Staff only.
    pub async fn record_offline_payment(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        method: PaymentMethod,
        payer_name: Option<&str>,
    ) -> Result<(Order, Payment), OrderFlowError> {
        require_staff(actor, "record payments")?;
        if method.is_gateway() {
            return Err(OrderFlowError::Validation("Card payments are recorded by the payment processor".into()));
        }
        let payer_name = payer_name.map(str::trim).filter(|n| !n.is_empty());
        let (order, payment) = self.db.record_offline_payment(order_id, method, payer_name, &actor.user_id).await?;
        info!("💰️ {} payment recorded for order #{} by {}", method, order.id, actor.user_id);
        self.after_payment(&order, &payment).await;
        Ok((order, payment))
    }

    async fn after_payment(&self, order: &Order, payment: &Payment) {
        let (orderer, patient) = self.recipients(order).await;
        match orderer {
            Some(orderer) => {
                let messages = notifications::payment_received(order, payment, &orderer, patient.as_ref());
                self.notify_all(messages).await;
            },
            None => warn!("📧️ No one to tell about the payment for order #{}", order.id),
        }
        self.producers.publish_payment(PaymentEvent::new(order.clone(), payment.clone())).await;
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::NotFound(format!("Order {order_id}")))
    }

    /// The user who placed the order and, if there is one, the patient it is for. Lookup failures are logged and the
    /// affected recipient is left out.
    async fn recipients(&self, order: &Order) -> (Option<Recipient>, Option<Recipient>) {
        let orderer = match self.db.fetch_user(&order.user_id).await {
            Ok(user) => user.as_ref().map(Recipient::from),
            Err(e) => {
                warn!("📧️ Could not fetch user {} for order #{}: {e}", order.user_id, order.id);
                None
            },
        };
        let patient = match &order.patient_id {
            Some(patient_id) => match self.db.fetch_patient(patient_id).await {
                Ok(patient) => patient.as_ref().map(Recipient::from),
                Err(e) => {
                    warn!("📧️ Could not fetch patient {patient_id} for order #{}: {e}", order.id);
                    None
                },
            },
            None => None,
        };
        (orderer, patient)
    }

    async fn notify_all(&self, messages: Vec<Notification>) {
        for message in messages {
            let destination = message.destination().to_string();
            match self.notifier.send(message).await {
                Ok(()) => trace!("📧️ Notification sent to {destination}"),
                Err(e) => warn!("📧️ Could not notify {destination}: {e}"),
            }
        }
    }
}

fn require_staff(actor: &Actor, action: &str) -> Result<(), OrderFlowError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(OrderFlowError::Forbidden(format!("Only pharmacy staff can {action}")))
    }
}
