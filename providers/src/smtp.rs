//! SMTP notifier implementation using Lettre.

use eventday_core::OtpPurpose;
use eventday_core::environment::{
    BoxFuture, DeliveryError, DeliveryReceipt, Notifier, OtpDelivery,
};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

/// SMTP connection settings.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    /// Relay host (e.g. `smtp.gmail.com`)
    pub host: String,
    /// Relay port, usually 587
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Sender address, `Name <addr>` or bare address
    pub from: String,
    /// Connection and command timeout
    pub timeout: Duration,
}

/// SMTP notifier.
///
/// The transport is built once at startup and shared by every send. Codes
/// are emailed to the customer; the phone number is included in the log only.
///
/// # Examples
///
/// ```ignore
/// use eventday_providers::{SmtpConfig, SmtpNotifier};
///
/// let notifier = SmtpNotifier::new(config)?;
/// notifier.verify().await?;
/// ```
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    host: String,
}

impl SmtpNotifier {
    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Misconfigured`] if the relay host is invalid.
    pub fn new(config: SmtpConfig) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| DeliveryError::Misconfigured {
                message: format!("SMTP relay error: {e}"),
                remediation: "Check SMTP_HOST".to_string(),
            })?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from: config.from,
            host: config.host,
        })
    }

    fn build_message(&self, delivery: &OtpDelivery) -> Result<Message, DeliveryError> {
        let (subject, action) = match delivery.purpose {
            OtpPurpose::Start => ("Your event start code", "start"),
            OtpPurpose::Closing => ("Your event completion code", "close"),
        };
        let minutes = (delivery.expires_at - chrono::Utc::now()).num_minutes().max(0);
        let body = format!(
            "Hi {name},\n\n\
             Your vendor is ready to {action} \"{event}\".\n\n\
             Share this code with them: {code}\n\n\
             The code expires in {minutes} minutes. If you did not expect this message you can ignore it.\n",
            name = delivery.customer_name,
            event = delivery.event_name,
            code = delivery.code.as_str(),
        );

        Message::builder()
            .from(self.from.parse().map_err(|e| DeliveryError::Misconfigured {
                message: format!("Invalid from address: {e}"),
                remediation: "Check SMTP_FROM".to_string(),
            })?)
            .to(delivery
                .customer_email
                .parse()
                .map_err(|e| DeliveryError::Transient(format!("Invalid customer email: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| DeliveryError::Transient(format!("Failed to build email: {e}")))
    }
}

impl Notifier for SmtpNotifier {
    fn send_otp(
        &self,
        delivery: OtpDelivery,
    ) -> BoxFuture<'_, Result<DeliveryReceipt, DeliveryError>> {
        Box::pin(async move {
            let message = self.build_message(&delivery)?;
            let response = self.transport.send(message).await.map_err(|e| {
                if e.is_permanent() {
                    DeliveryError::Misconfigured {
                        message: format!("SMTP server refused the message: {e}"),
                        remediation: "Check SMTP_USERNAME, SMTP_PASSWORD and SMTP_FROM".to_string(),
                    }
                } else {
                    DeliveryError::Transient(format!("Failed to send email: {e}"))
                }
            })?;
            debug!(
                event_id = %delivery.event_id,
                purpose = %delivery.purpose,
                phone = %delivery.customer_phone,
                "OTP emailed"
            );
            Ok(DeliveryReceipt {
                channel: "smtp",
                reference: response.message().next().map(ToString::to_string),
            })
        })
    }

    fn verify(&self) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async move {
            match self.transport.test_connection().await {
                Ok(true) => {
                    info!(host = %self.host, "SMTP connection verified");
                    Ok(())
                },
                Ok(false) => Err(DeliveryError::Misconfigured {
                    message: format!("SMTP server {} did not accept the connection", self.host),
                    remediation: "Check SMTP_HOST and SMTP_PORT".to_string(),
                }),
                Err(e) => Err(DeliveryError::Misconfigured {
                    message: format!("SMTP connection failed: {e}"),
                    remediation: "Check SMTP_HOST, SMTP_PORT and credentials".to_string(),
                }),
            }
        })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use eventday_core::{EventId, OtpCode};

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new(SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "Eventday <noreply@example.com>".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn delivery(email: &str) -> OtpDelivery {
        OtpDelivery {
            event_id: EventId::new(),
            event_name: "Launch".into(),
            customer_name: "Ana".into(),
            customer_email: email.into(),
            customer_phone: "+15550199".into(),
            purpose: OtpPurpose::Closing,
            code: OtpCode::from_number(654_321),
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(10),
        }
    }

    #[test]
    fn message_carries_code() {
        let message = notifier().build_message(&delivery("ana@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("654321"));
        assert!(raw.contains("Your event completion code"));
    }

    #[test]
    fn invalid_customer_email_is_transient_failure() {
        assert!(matches!(
            notifier().build_message(&delivery("nope")),
            Err(DeliveryError::Transient(_))
        ));
    }
}
