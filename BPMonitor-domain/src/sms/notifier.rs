use std::sync::Arc;

use tracing::{info, warn};

use super::{
    format_phone_number, send_bp_alert, send_verification_code, SmsError, SmsGateway, SmsReceipt,
    TwilioConfig, TwilioGateway,
};

/// How a notification was handled
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent(SmsReceipt),
    /// No transport is configured; the message went to the log
    Logged,
}

/// Delivers verification codes and alerts.
///
/// There is no mail transport, so emails are always logged. Texts go
/// through the SMS gateway when one is configured.
#[derive(Clone, Default)]
pub struct Notifier {
    sms: Option<Arc<dyn SmsGateway>>,
}

impl Notifier {
    pub fn new(sms: Option<Arc<dyn SmsGateway>>) -> Self {
        Self { sms }
    }

    /// Notifier with no SMS gateway
    pub fn log_only() -> Self {
        Self { sms: None }
    }

    /// Use Twilio when its credentials are present
    pub fn from_env() -> Self {
        let config = TwilioConfig::from_env();
        if config.is_configured() {
            info!("Twilio SMS delivery enabled");
            Self::new(Some(Arc::new(TwilioGateway::new(config))))
        } else {
            info!("Twilio not configured; SMS messages will be logged");
            Self::log_only()
        }
    }

    pub fn sms_enabled(&self) -> bool {
        self.sms.is_some()
    }

    pub fn send_verification_email(&self, email: &str, code: &str) -> Delivery {
        info!("Verification code for {} is {} (email delivery is not configured)", email, code);
        Delivery::Logged
    }

    pub async fn send_verification_sms(&self, mobile: &str, code: &str) -> Result<Delivery, SmsError> {
        let to = format_phone_number(mobile);
        if to.is_empty() {
            return Err(SmsError::InvalidNumber(mobile.to_string()));
        }

        match &self.sms {
            Some(gateway) => send_verification_code(gateway.as_ref(), &to, code)
                .await
                .map(Delivery::Sent),
            None => {
                info!("Verification code for {} is {} (SMS delivery is not configured)", to, code);
                Ok(Delivery::Logged)
            }
        }
    }

    /// Text an alert about a reading; requires a gateway
    pub async fn send_alert(
        &self,
        mobile: &str,
        name: &str,
        systolic: u32,
        diastolic: u32,
        category: &str,
    ) -> Result<SmsReceipt, SmsError> {
        let gateway = self.sms.as_ref().ok_or(SmsError::NotConfigured)?;
        let to = format_phone_number(mobile);
        if to.is_empty() {
            return Err(SmsError::InvalidNumber(mobile.to_string()));
        }

        send_bp_alert(gateway.as_ref(), &to, name, systolic, diastolic, category)
            .await
            .map_err(|e| {
                warn!("Alert for {} could not be sent: {}", name, e);
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sms::{verification_message, MockSmsGateway};
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_sms_is_logged_without_gateway() {
        let notifier = Notifier::log_only();
        assert!(!notifier.sms_enabled());
        assert_eq!(
            notifier.send_verification_sms("555-123-4567", "123456").await.unwrap(),
            Delivery::Logged
        );
        assert!(matches!(
            notifier.send_alert("5551234567", "Ann", 190, 100, "Hypertensive Crisis").await,
            Err(SmsError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_sms_uses_gateway_with_formatted_number() {
        let mut gateway = MockSmsGateway::new();
        gateway
            .expect_send_sms()
            .with(eq("+15551234567"), eq(verification_message("654321")))
            .times(1)
            .returning(|_, _| {
                Ok(SmsReceipt {
                    sid: "SM1".to_string(),
                    message: "SMS sent successfully".to_string(),
                })
            });

        let notifier = Notifier::new(Some(Arc::new(gateway)));
        let delivery = notifier.send_verification_sms("(555) 123-4567", "654321").await.unwrap();
        assert!(matches!(delivery, Delivery::Sent(receipt) if receipt.sid == "SM1"));
    }

    #[tokio::test]
    async fn test_number_without_digits_is_rejected() {
        let notifier = Notifier::log_only();
        assert!(matches!(
            notifier.send_verification_sms("n/a", "111111").await,
            Err(SmsError::InvalidNumber(_))
        ));
    }
}
