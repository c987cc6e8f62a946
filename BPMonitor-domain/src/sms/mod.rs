//! SMS delivery through Twilio
//!
//! The gateway is a trait so the notifier and the alert endpoint can run
//! without credentials, and so tests can substitute a mock.

use std::env;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use utoipa::ToSchema;

pub mod notifier;

pub use notifier::{Delivery, Notifier};

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// SMS delivery errors
#[derive(Debug, Error)]
pub enum SmsError {
    #[error("Twilio credentials are not configured. Please set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, and TWILIO_PHONE_NUMBER environment variables.")]
    NotConfigured,

    #[error("Invalid phone number: {0}")]
    InvalidNumber(String),

    #[error("Failed to send SMS: {0}")]
    Delivery(String),
}

/// Confirmation of a sent message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SmsReceipt {
    /// Provider message id
    pub sid: String,
    pub message: String,
}

/// Something that can deliver a text message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send `body` to a number in E.164 format
    async fn send_sms(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError>;
}

/// Twilio credentials from environment variables
#[derive(Debug, Clone, Default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl TwilioConfig {
    pub fn from_env() -> Self {
        Self {
            account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            from_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            api_base: env::var("TWILIO_API_BASE").unwrap_or_else(|_| TWILIO_API_BASE.to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_number.is_empty()
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

/// Gateway posting to the Twilio Messages API
pub struct TwilioGateway {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send_sms(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        if !self.config.is_configured() {
            return Err(SmsError::NotConfigured);
        }

        debug!("Sending SMS to {}", to);
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach Twilio: {}", e);
                SmsError::Delivery(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TwilioErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            error!("Twilio rejected message: {} - {}", status, detail);
            return Err(SmsError::Delivery(format!("{} - {}", status, detail)));
        }

        let message: TwilioMessage = response
            .json()
            .await
            .map_err(|e| SmsError::Delivery(format!("Unexpected Twilio response: {}", e)))?;

        info!("SMS sent: sid={}", message.sid);
        Ok(SmsReceipt {
            sid: message.sid,
            message: "SMS sent successfully".to_string(),
        })
    }
}

/// Normalize a phone number towards E.164.
///
/// Ten digits are taken as a US number; longer inputs are assumed to carry
/// a country code. Anything shorter is returned as bare digits.
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("+1{}", digits),
        n if n > 10 => format!("+{}", digits),
        _ => digits,
    }
}

pub fn verification_message(code: &str) -> String {
    format!(
        "Your Blood Pressure Monitor verification code is: {}. This code will expire in 24 hours.",
        code
    )
}

pub fn bp_alert_message(name: &str, systolic: u32, diastolic: u32, category: &str) -> String {
    format!(
        "ALERT: {}'s blood pressure reading of {}/{} mmHg is categorized as '{}'. Please take appropriate action.",
        name, systolic, diastolic, category
    )
}

/// Text a verification code
pub async fn send_verification_code(
    gateway: &dyn SmsGateway,
    to: &str,
    code: &str,
) -> Result<SmsReceipt, SmsError> {
    gateway.send_sms(to, &verification_message(code)).await
}

/// Text a blood pressure alert
pub async fn send_bp_alert(
    gateway: &dyn SmsGateway,
    to: &str,
    name: &str,
    systolic: u32,
    diastolic: u32,
    category: &str,
) -> Result<SmsReceipt, SmsError> {
    gateway
        .send_sms(to, &bp_alert_message(name, systolic, diastolic, category))
        .await
}
