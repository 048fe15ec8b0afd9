//! Live order updates for staff dashboards.
//!
//! [`LiveUpdates`] is a broadcast hub. The engine's event hooks feed it ([`LiveUpdates::hooks`]) and every connected
//! dashboard holds a receiver, streamed to the browser as server-sent events named `newOrder`, `orderStatusUpdate`
//! and `payment`. A client that falls too far behind skips the events it missed and carries on.
use std::{future::Future, pin::Pin};

use actix_web::web::Bytes;
use futures::{stream, Stream};
use log::*;
use pharmacy_engine::events::{EventHooks, EventType};
use tokio::sync::broadcast::{self, error::RecvError};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Clone)]
pub struct LiveUpdates {
    sender: broadcast::Sender<EventType>,
}

impl LiveUpdates {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends the event to every connected client. Having no clients is fine.
    pub fn publish(&self, event: EventType) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(n) => trace!("📡️ {name} update sent to {n} clients"),
            Err(_) => trace!("📡️ No clients listening for {name} updates"),
        }
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventType> {
        self.sender.subscribe()
    }

    /// Event hooks that forward every engine event to this hub.
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let hub = self.clone();
        hooks.on_new_order(move |ev| {
            hub.publish(EventType::NewOrder(ev));
            Box::pin(async {}) as BoxedFuture
        });
        let hub = self.clone();
        hooks.on_order_status_update(move |ev| {
            hub.publish(EventType::OrderStatusUpdate(ev));
            Box::pin(async {}) as BoxedFuture
        });
        let hub = self.clone();
        hooks.on_payment(move |ev| {
            hub.publish(EventType::Payment(ev));
            Box::pin(async {}) as BoxedFuture
        });
        hooks
    }

    /// A new client's view of the hub, as a stream of server-sent event frames.
    pub fn event_stream(&self) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
        stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match sse_frame(&event) {
                        Some(frame) => return Some((Ok(frame), rx)),
                        None => continue,
                    },
                    Err(RecvError::Lagged(n)) => {
                        warn!("📡️ A live update client fell behind and missed {n} updates");
                        continue;
                    },
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

/// Formats an event as `event: <name>` and a single `data:` line holding its JSON.
pub fn sse_frame(event: &EventType) -> Option<Bytes> {
    let data = match event {
        EventType::NewOrder(ev) => serde_json::to_string(ev),
        EventType::OrderStatusUpdate(ev) => serde_json::to_string(ev),
        EventType::Payment(ev) => serde_json::to_string(ev),
    };
    match data {
        Ok(json) => Some(Bytes::from(format!("event: {}\ndata: {json}\n\n", event.name()))),
        Err(e) => {
            error!("📡️ Could not serialize {} update. {e}", event.name());
            None
        },
    }
}
