//! Price-alert subscription client.
//!
//! Posts `{product_name, notification_channel, user_identifier,
//! desired_discount_percentage}` to `{base_url}{subscribe_path}` after
//! validating it locally. The backend answers `{message, subscription_key}`
//! on success and `{error}` otherwise.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    WhatsApp,
    Telegram,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::WhatsApp => write!(f, "whatsapp"),
            NotificationChannel::Telegram => write!(f, "telegram"),
        }
    }
}

impl FromStr for NotificationChannel {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(NotificationChannel::WhatsApp),
            "telegram" => Ok(NotificationChannel::Telegram),
            other => Err(SubscriptionError::InvalidChannel(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid notification_channel '{0}', expected whatsapp or telegram")]
    InvalidChannel(String),
    #[error("invalid phone number '{0}': use the international format, e.g. +51987654321")]
    InvalidPhone(String),
    #[error("invalid chat_id '{0}': Telegram chat ids are numeric")]
    InvalidChatId(String),
    #[error("discount percentage must be between 0 and 100 (exclusive), got {0}")]
    InvalidDiscount(f64),
    #[error("subscription rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRequest {
    pub product_name: String,
    pub notification_channel: NotificationChannel,
    pub user_identifier: String,
    pub desired_discount_percentage: f64,
}

impl SubscriptionRequest {
    /// Trim and normalise every field, rejecting anything the backend would.
    pub fn new(
        product_name: &str,
        channel: NotificationChannel,
        user_identifier: &str,
        discount: f64,
    ) -> Result<Self, SubscriptionError> {
        let product_name = product_name.trim();
        if product_name.is_empty() {
            return Err(SubscriptionError::MissingField("product_name"));
        }
        let raw_identifier = user_identifier.trim();
        if raw_identifier.is_empty() {
            return Err(SubscriptionError::MissingField("user_identifier"));
        }
        if !(discount > 0.0 && discount < 100.0) {
            return Err(SubscriptionError::InvalidDiscount(discount));
        }

        let user_identifier = match channel {
            NotificationChannel::WhatsApp => normalize_phone(raw_identifier)?,
            NotificationChannel::Telegram => validate_chat_id(raw_identifier)?,
        };

        Ok(Self {
            product_name: product_name.to_string(),
            notification_channel: channel,
            user_identifier,
            desired_discount_percentage: discount,
        })
    }
}

/// Strip spaces and dashes; require `+` followed by digits, 10 chars minimum.
pub fn normalize_phone(raw: &str) -> Result<String, SubscriptionError> {
    let phone: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    let valid = phone.len() >= 10
        && phone
            .strip_prefix('+')
            .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(phone)
    } else {
        Err(SubscriptionError::InvalidPhone(raw.to_string()))
    }
}

// Group chats carry a negative id.
fn validate_chat_id(raw: &str) -> Result<String, SubscriptionError> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(raw.to_string())
    } else {
        Err(SubscriptionError::InvalidChatId(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub subscription_key: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// POST the request and return the backend's acknowledgement.
pub async fn subscribe(
    config: &Config,
    request: &SubscriptionRequest,
) -> Result<SubscriptionResponse> {
    let url = config.endpoint.subscribe_url();
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.endpoint.connect_timeout_secs))
        .build()?;

    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let reason = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
        return Err(SubscriptionError::Rejected(reason).into());
    }

    let ack: SubscriptionResponse =
        serde_json::from_str(&body).with_context(|| "Failed to parse subscription response")?;
    info!(
        product = %request.product_name,
        channel = %request.notification_channel,
        keys = ack.subscription_key.len(),
        "price alert subscribed"
    );
    Ok(ack)
}

/// CLI entry point for `scout subscribe`.
pub async fn run_subscribe(
    config: &Config,
    product: &str,
    channel: &str,
    identifier: &str,
    discount: f64,
) -> Result<()> {
    let channel: NotificationChannel = channel.parse()?;
    let request = SubscriptionRequest::new(product, channel, identifier, discount)?;
    let ack = subscribe(config, &request).await?;

    println!("Subscribed: {}", ack.message);
    if !ack.subscription_key.is_empty() {
        println!("Key: {}", ack.subscription_key.join(", "));
    }
    Ok(())
}
