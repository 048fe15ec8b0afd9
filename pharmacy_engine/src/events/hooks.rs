use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, NewOrderEvent, OrderStatusEvent, PaymentEvent};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The publishing side of the hooks, handed to the APIs that emit events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub new_order_producer: Vec<EventProducer<NewOrderEvent>>,
    pub status_update_producer: Vec<EventProducer<OrderStatusEvent>>,
    pub payment_producer: Vec<EventProducer<PaymentEvent>>,
}

impl EventProducers {
    pub async fn publish_new_order(&self, event: NewOrderEvent) {
        for producer in &self.new_order_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_status_update(&self, event: OrderStatusEvent) {
        for producer in &self.status_update_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment(&self, event: PaymentEvent) {
        for producer in &self.payment_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_new_order: Option<EventHandler<NewOrderEvent>>,
    pub on_order_status_update: Option<EventHandler<OrderStatusEvent>>,
    pub on_payment: Option<EventHandler<PaymentEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_new_order = hooks.on_new_order.map(|f| EventHandler::new(buffer_size, f));
        let on_order_status_update = hooks.on_order_status_update.map(|f| EventHandler::new(buffer_size, f));
        let on_payment = hooks.on_payment.map(|f| EventHandler::new(buffer_size, f));
        Self { on_new_order, on_order_status_update, on_payment }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_new_order {
            result.new_order_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_status_update {
            result.status_update_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment {
            result.payment_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_new_order {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_status_update {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_new_order: Option<Handler<NewOrderEvent>>,
    pub on_order_status_update: Option<Handler<OrderStatusEvent>>,
    pub on_payment: Option<Handler<PaymentEvent>>,
}

impl EventHooks {
    pub fn on_new_order<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NewOrderEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_new_order = Some(Arc::new(f));
        self
    }

    pub fn on_order_status_update<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_status_update = Some(Arc::new(f));
        self
    }

    pub fn on_payment<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment = Some(Arc::new(f));
        self
    }
}
