use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Could not deliver notification: {0}")]
    DeliveryFailed(String),
    #[error("Notification service is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub phone_number: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Email(EmailMessage),
    Sms(SmsMessage),
}

impl Notification {
    pub fn email<S1: Into<String>, S2: Into<String>, S3: Into<String>>(to: S1, subject: S2, html_body: S3) -> Self {
        Self::Email(EmailMessage { to: to.into(), subject: subject.into(), html_body: html_body.into() })
    }

    pub fn sms<S1: Into<String>, S2: Into<String>>(phone_number: S1, message: S2) -> Self {
        Self::Sms(SmsMessage { phone_number: phone_number.into(), message: message.into() })
    }

    /// The email address or phone number the notification goes to.
    pub fn destination(&self) -> &str {
        match self {
            Notification::Email(m) => &m.to,
            Notification::Sms(m) => &m.phone_number,
        }
    }
}

/// Sends emails and text messages. Delivery is best-effort: callers log failures and carry on.
#[allow(async_fn_in_trait)]
pub trait Notifier: Clone {
    async fn send_email(&self, message: EmailMessage) -> Result<(), NotificationError>;

    async fn send_sms(&self, message: SmsMessage) -> Result<(), NotificationError>;

    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        match notification {
            Notification::Email(m) => self.send_email(m).await,
            Notification::Sms(m) => self.send_sms(m).await,
        }
    }
}
