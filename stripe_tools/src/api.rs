use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{NewPaymentIntent, NewRefund, PaymentIntent, Refund},
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Stripe takes form-encoded request bodies and answers with JSON.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending Stripe request: {method} {url}");
        let mut req = self.client.request(method, url);
        if !form.is_empty() {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ Stripe request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    pub async fn create_payment_intent(&self, intent: &NewPaymentIntent) -> Result<PaymentIntent, StripeApiError> {
        if intent.amount <= 0 {
            return Err(StripeApiError::InvalidAmount(format!("{} is not a chargeable amount", intent.amount)));
        }
        debug!("💳️ Creating payment intent for {} {}", intent.amount, intent.currency);
        let result =
            self.rest_query::<PaymentIntent>(Method::POST, "/payment_intents", &intent.form_params()).await?;
        info!("💳️ Created payment intent {}", result.id);
        Ok(result)
    }

    pub async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        let path = format!("/payment_intents/{intent_id}");
        debug!("💳️ Fetching payment intent {intent_id}");
        self.rest_query::<PaymentIntent>(Method::GET, &path, &[]).await
    }

    pub async fn create_refund(&self, refund: &NewRefund) -> Result<Refund, StripeApiError> {
        debug!("💳️ Requesting refund for payment intent {}", refund.payment_intent);
        let result = self.rest_query::<Refund>(Method::POST, "/refunds", &refund.form_params()).await?;
        info!("💳️ Refund {} for {} is {:?}", result.id, refund.payment_intent, result.status);
        Ok(result)
    }
}
