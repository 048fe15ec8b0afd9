//! In-memory stand-ins for the card processor and the messaging service.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    db_types::OrderId,
    traits::{
        EmailMessage,
        GatewayIntent,
        GatewayRefund,
        IntentRequest,
        Notification,
        NotificationError,
        Notifier,
        PaymentProcessor,
        PaymentProcessorError,
        RefundRequest,
        SmsMessage,
    },
};

/// Records every notification it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct FakeNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every send fails after being recorded.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().expect("lock poisoned") = failing;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    pub fn emails_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Email(m) if m.to == address => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn sms_to(&self, phone: &str) -> Vec<SmsMessage> {
        self.sent()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Sms(m) if m.phone_number == phone => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().expect("lock poisoned").clear();
    }

    fn record(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().expect("lock poisoned").push(notification);
        if *self.failing.lock().expect("lock poisoned") {
            Err(NotificationError::DeliveryFailed("fake notifier is failing".into()))
        } else {
            Ok(())
        }
    }
}

impl Notifier for FakeNotifier {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.record(Notification::Email(message))
    }

    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotificationError> {
        self.record(Notification::Sms(message))
    }
}

#[derive(Debug, Default)]
struct ProcessorState {
    intents: HashMap<String, GatewayIntent>,
    intent_requests: Vec<IntentRequest>,
    refund_requests: Vec<RefundRequest>,
    refund_status: Option<String>,
    unavailable: bool,
}

/// A card processor that keeps its intents in memory. Intents start out as `requires_payment_method`; tests move
/// them along with [`FakePaymentProcessor::set_intent_status`].
#[derive(Debug, Clone, Default)]
pub struct FakePaymentProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl FakePaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().expect("lock poisoned").unavailable = unavailable;
    }

    /// The status reported for new refunds. Defaults to `succeeded`.
    pub fn set_refund_status(&self, status: &str) {
        self.state.lock().expect("lock poisoned").refund_status = Some(status.to_string());
    }

    pub fn set_intent_status(&self, intent_id: &str, status: &str) {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(intent) = state.intents.get_mut(intent_id) {
            intent.status = status.to_string();
        }
    }

    pub fn intent_requests(&self) -> Vec<IntentRequest> {
        self.state.lock().expect("lock poisoned").intent_requests.clone()
    }

    pub fn refund_requests(&self) -> Vec<RefundRequest> {
        self.state.lock().expect("lock poisoned").refund_requests.clone()
    }

    /// Registers an intent the processor knows about but which was never created through this fake.
    pub fn insert_intent(&self, intent_id: &str, order_id: Option<OrderId>, status: &str) {
        let intent = GatewayIntent {
            intent_id: intent_id.to_string(),
            client_secret: format!("{intent_id}_secret"),
            status: status.to_string(),
            payer_name: None,
            order_id,
        };
        self.state.lock().expect("lock poisoned").intents.insert(intent_id.to_string(), intent);
    }
}

impl PaymentProcessor for FakePaymentProcessor {
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent, PaymentProcessorError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.unavailable {
            return Err(PaymentProcessorError::Unavailable("fake processor is down".into()));
        }
        let intent_id = format!("pi_fake_{}", state.intent_requests.len() + 1);
        let intent = GatewayIntent {
            client_secret: format!("{intent_id}_secret"),
            intent_id: intent_id.clone(),
            status: "requires_payment_method".into(),
            payer_name: request.payer_name.clone(),
            order_id: Some(request.order_id.clone()),
        };
        state.intent_requests.push(request);
        state.intents.insert(intent_id, intent.clone());
        Ok(intent)
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<GatewayIntent, PaymentProcessorError> {
        let state = self.state.lock().expect("lock poisoned");
        if state.unavailable {
            return Err(PaymentProcessorError::Unavailable("fake processor is down".into()));
        }
        state
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentProcessorError::Rejected(format!("No such payment_intent: {intent_id}")))
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PaymentProcessorError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.unavailable {
            return Err(PaymentProcessorError::Unavailable("fake processor is down".into()));
        }
        let status = state.refund_status.clone().unwrap_or_else(|| "succeeded".to_string());
        state.refund_requests.push(request);
        Ok(GatewayRefund { refund_id: format!("re_fake_{}", state.refund_requests.len()), status })
    }
}
