//! Email and SMS delivery through HTTP relays.
//!
//! Each relay takes the message as JSON and answers `{"success": bool, "error": "..."}`. A relay that has not been
//! configured makes every send fail with [`NotificationError::NotConfigured`], which the engine logs and moves past.
use std::sync::Arc;

use log::*;
use pharmacy_engine::traits::{EmailMessage, NotificationError, Notifier, SmsMessage};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct RelayNotifier {
    config: NotificationConfig,
    client: Arc<Client>,
}

impl RelayNotifier {
    pub fn new(config: NotificationConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    async fn relay<T: Serialize>(&self, url: Option<&String>, kind: &str, message: &T) -> Result<(), NotificationError> {
        let url = url.ok_or_else(|| NotificationError::NotConfigured(format!("no {kind} relay")))?;
        let mut req = self.client.post(url).json(message);
        let key = self.config.api_key.reveal();
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::DeliveryFailed(format!("{kind} relay answered {status}")));
        }
        let result = response
            .json::<RelayResponse>()
            .await
            .map_err(|e| NotificationError::DeliveryFailed(format!("Unreadable {kind} relay response. {e}")))?;
        if result.success {
            Ok(())
        } else {
            let reason = result.error.unwrap_or_else(|| "no reason given".to_string());
            Err(NotificationError::DeliveryFailed(reason))
        }
    }
}

impl Notifier for RelayNotifier {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError> {
        debug!("📨️ Sending email \"{}\" to {}", message.subject, message.to);
        self.relay(self.config.email_relay_url.as_ref(), "email", &message).await
    }

    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotificationError> {
        debug!("📨️ Sending text message to {}", message.phone_number);
        self.relay(self.config.sms_relay_url.as_ref(), "SMS", &message).await
    }
}
