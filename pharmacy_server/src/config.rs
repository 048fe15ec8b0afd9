//! Server configuration.
//!
//! Every setting comes from an `RX_` environment variable. Missing or unparseable values are logged and replaced by
//! defaults so that a development server starts with an empty environment. Secrets are wrapped in [`Secret`] and never
//! printed.
use std::{env, fmt::Display, str::FromStr};

use log::*;
use pharmacy_common::{Secret, DEFAULT_CURRENCY_CODE};
use pharmacy_engine::sqlite_db::db_url;
use stripe_tools::StripeConfig;

const DEFAULT_RX_HOST: &str = "127.0.0.1";
const DEFAULT_RX_PORT: u16 = 8470;
const DEFAULT_LIVE_UPDATE_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The currency card payments are taken in
    pub currency: String,
    /// How many live updates a slow dashboard client may fall behind before it starts missing them
    pub live_update_buffer: usize,
    pub stripe: StripeConfig,
    pub notifications: NotificationConfig,
}

/// Where emails and text messages are handed off for delivery.
#[derive(Clone, Debug, Default)]
pub struct NotificationConfig {
    pub email_relay_url: Option<String>,
    pub sms_relay_url: Option<String>,
    pub api_key: Secret<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RX_HOST.to_string(),
            port: DEFAULT_RX_PORT,
            database_url: String::default(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            live_update_buffer: DEFAULT_LIVE_UPDATE_BUFFER,
            stripe: StripeConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RX_HOST").ok().unwrap_or_else(|| DEFAULT_RX_HOST.into());
        let port = parse_or_default("RX_PORT", env::var("RX_PORT").ok(), DEFAULT_RX_PORT);
        let database_url = db_url();
        let currency = env::var("RX_CURRENCY")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let live_update_buffer =
            parse_or_default("RX_LIVE_UPDATE_BUFFER", env::var("RX_LIVE_UPDATE_BUFFER").ok(), DEFAULT_LIVE_UPDATE_BUFFER);
        let live_update_buffer = if live_update_buffer == 0 {
            warn!("🪛️ RX_LIVE_UPDATE_BUFFER must be at least 1. Using {DEFAULT_LIVE_UPDATE_BUFFER}.");
            DEFAULT_LIVE_UPDATE_BUFFER
        } else {
            live_update_buffer
        };
        let stripe = StripeConfig::new_from_env_or_default();
        let notifications = NotificationConfig::from_env_or_default();
        Self { host, port, database_url, currency, live_update_buffer, stripe, notifications }
    }
}

impl NotificationConfig {
    pub fn from_env_or_default() -> Self {
        let email_relay_url = relay_url("RX_EMAIL_RELAY_URL");
        let sms_relay_url = relay_url("RX_SMS_RELAY_URL");
        let api_key = Secret::new(env::var("RX_RELAY_API_KEY").unwrap_or_else(|_| {
            if email_relay_url.is_some() || sms_relay_url.is_some() {
                warn!("🪛️ RX_RELAY_API_KEY is not set. Relay requests will not be authenticated.");
            }
            String::default()
        }));
        Self { email_relay_url, sms_relay_url, api_key }
    }
}

fn relay_url(name: &str) -> Option<String> {
    let url = env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    if url.is_none() {
        warn!("🪛️ {name} is not set. These notifications will be logged and dropped.");
    }
    url
}

fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}
