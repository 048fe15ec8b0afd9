//! Stripe as the engine's card [`PaymentProcessor`].
//!
//! The order id, code and payer travel as intent metadata, and the order id, actor and comment as refund metadata.
//! The webhook handler reads them back when Stripe reports the outcome.
use log::*;
use pharmacy_engine::{
    db_types::OrderId,
    traits::{GatewayIntent, GatewayRefund, IntentRequest, PaymentProcessor, PaymentProcessorError, RefundRequest},
};
use stripe_tools::{NewPaymentIntent, NewRefund, PaymentIntent, RefundStatus, StripeApi, StripeApiError, StripeConfig};

pub const ORDER_ID_KEY: &str = "order_id";
pub const ORDER_CODE_KEY: &str = "order_code";
pub const PAYER_NAME_KEY: &str = "payer_name";
pub const ACTOR_ID_KEY: &str = "actor_id";
pub const COMMENT_KEY: &str = "comment";

#[derive(Clone)]
pub struct StripeProcessor {
    api: StripeApi,
    currency: String,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig, currency: &str) -> Result<Self, StripeApiError> {
        let api = StripeApi::new(config)?;
        Ok(Self { api, currency: currency.to_lowercase() })
    }
}

impl PaymentProcessor for StripeProcessor {
    async fn create_intent(&self, request: IntentRequest) -> Result<GatewayIntent, PaymentProcessorError> {
        let mut intent = NewPaymentIntent::new(request.amount.cents(), &self.currency)
            .with_description(format!("Order #{}", request.order_number))
            .with_metadata(ORDER_ID_KEY, request.order_id.as_str())
            .with_metadata(ORDER_CODE_KEY, request.order_code.as_str());
        if let Some(name) = &request.payer_name {
            intent = intent.with_metadata(PAYER_NAME_KEY, name.as_str());
        }
        let result = self.api.create_payment_intent(&intent).await.map_err(processor_error)?;
        if result.client_secret.is_none() {
            return Err(PaymentProcessorError::Rejected(format!("Intent {} came back without a client secret", result.id)));
        }
        Ok(gateway_intent(result))
    }

    async fn fetch_intent(&self, intent_id: &str) -> Result<GatewayIntent, PaymentProcessorError> {
        let intent = self.api.get_payment_intent(intent_id).await.map_err(processor_error)?;
        Ok(gateway_intent(intent))
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<GatewayRefund, PaymentProcessorError> {
        let mut refund = NewRefund::new(request.intent_id.as_str())
            .with_metadata(ORDER_ID_KEY, request.order_id.as_str())
            .with_metadata(ACTOR_ID_KEY, request.actor_id.as_str());
        if let Some(comment) = &request.comment {
            refund = refund.with_metadata(COMMENT_KEY, comment.as_str());
        }
        let result = self.api.create_refund(&refund).await.map_err(processor_error)?;
        Ok(GatewayRefund { refund_id: result.id, status: refund_status(result.status).to_string() })
    }
}

pub fn gateway_intent(intent: PaymentIntent) -> GatewayIntent {
    GatewayIntent {
        payer_name: intent.metadata.get(PAYER_NAME_KEY).cloned(),
        order_id: intent.metadata.get(ORDER_ID_KEY).map(|s| OrderId::from(s.as_str())),
        client_secret: intent.client_secret.unwrap_or_default(),
        intent_id: intent.id,
        status: intent.status,
    }
}

fn refund_status(status: RefundStatus) -> &'static str {
    match status {
        RefundStatus::Pending => "pending",
        RefundStatus::RequiresAction => "requires_action",
        RefundStatus::Succeeded => "succeeded",
        RefundStatus::Failed => "failed",
        RefundStatus::Canceled => "canceled",
        RefundStatus::Unknown => "unknown",
    }
}

/// Transport failures and Stripe-side outages are `Unavailable`; everything else Stripe refused outright.
fn processor_error(e: StripeApiError) -> PaymentProcessorError {
    warn!("💳️ Stripe request failed. {e}");
    match e {
        StripeApiError::Initialization(_) | StripeApiError::RestRequestError(_) | StripeApiError::RestResponseError(_) => {
            PaymentProcessorError::Unavailable(e.to_string())
        },
        StripeApiError::QueryError { status, .. } if status >= 500 || status == 429 => {
            PaymentProcessorError::Unavailable(e.to_string())
        },
        _ => PaymentProcessorError::Rejected(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use pharmacy_common::{Money, Secret};
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock,
        MockServer,
        ResponseTemplate,
    };

    use super::*;

    fn processor(server: &MockServer) -> StripeProcessor {
        let config = StripeConfig {
            api_url: server.uri(),
            secret_key: Secret::new("sk_test_123".to_string()),
            ..StripeConfig::default()
        };
        StripeProcessor::new(config, "USD").unwrap()
    }

    #[tokio::test]
    async fn intents_carry_the_order_in_their_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("metadata%5Border_id%5D=ord_42"))
            .and(body_string_contains("metadata%5Bpayer_name%5D=Rosa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_42",
                "client_secret": "pi_42_secret_x",
                "amount": 2150,
                "currency": "usd",
                "status": "requires_payment_method",
                "metadata": {"order_id": "ord_42", "order_code": "K3XQ", "payer_name": "Rosa"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let request = IntentRequest {
            order_id: OrderId::from("ord_42"),
            order_code: "K3XQ".into(),
            order_number: 42,
            amount: Money::from_cents(2150),
            payer_name: Some("Rosa".into()),
        };
        let intent = processor(&server).create_intent(request).await.unwrap();
        assert_eq!(intent.intent_id, "pi_42");
        assert_eq!(intent.client_secret, "pi_42_secret_x");
        assert_eq!(intent.order_id, Some(OrderId::from("ord_42")));
        assert_eq!(intent.payer_name.as_deref(), Some("Rosa"));
        assert!(!intent.is_succeeded());
    }

    #[tokio::test]
    async fn refunds_report_their_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/refunds"))
            .and(body_string_contains("payment_intent=pi_42"))
            .and(body_string_contains("metadata%5Bactor_id%5D=carol"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "re_1",
                "amount": 2150,
                "payment_intent": "pi_42",
                "status": "succeeded",
                "metadata": {"order_id": "ord_42", "actor_id": "carol"}
            })))
            .mount(&server)
            .await;
        let request = RefundRequest {
            intent_id: "pi_42".into(),
            order_id: OrderId::from("ord_42"),
            actor_id: "carol".into(),
            comment: None,
        };
        let refund = processor(&server).create_refund(request).await.unwrap();
        assert_eq!(refund.refund_id, "re_1");
        assert!(refund.is_succeeded());
    }

    #[tokio::test]
    async fn stripe_outages_are_reported_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try again later"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_unknown"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such payment_intent"))
            .mount(&server)
            .await;
        let processor = processor(&server);
        let err = processor.fetch_intent("pi_1").await.unwrap_err();
        assert!(matches!(err, PaymentProcessorError::Unavailable(_)));
        let err = processor.fetch_intent("pi_unknown").await.unwrap_err();
        assert!(matches!(err, PaymentProcessorError::Rejected(_)));
    }
}
