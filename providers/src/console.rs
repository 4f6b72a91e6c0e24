//! Console notifier for development and testing.

use eventday_core::environment::{
    BoxFuture, DeliveryError, DeliveryReceipt, Notifier, OtpDelivery,
};
use tracing::info;

/// Console notifier.
///
/// Logs codes instead of delivering them. Useful for local development where
/// the vendor reads the code off the server log.
///
/// # Examples
///
/// ```ignore
/// use eventday_providers::ConsoleNotifier;
///
/// let notifier = ConsoleNotifier::new();
/// notifier.send_otp(delivery).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Create a new console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Notifier for ConsoleNotifier {
    fn send_otp(
        &self,
        delivery: OtpDelivery,
    ) -> BoxFuture<'_, Result<DeliveryReceipt, DeliveryError>> {
        Box::pin(async move {
            info!(
                event_id = %delivery.event_id,
                purpose = %delivery.purpose,
                phone = %delivery.customer_phone,
                email = %delivery.customer_email,
                code = %delivery.code.as_str(),
                expires_at = %delivery.expires_at,
                "OTP (development mode, not delivered)"
            );
            println!("\n╔══════════════════════════════════════════════════════════════╗");
            println!("║                         OTP SENT                             ║");
            println!("╠══════════════════════════════════════════════════════════════╣");
            println!("║ Event:   {:<52}║", delivery.event_name);
            println!("║ Purpose: {:<52}║", delivery.purpose.as_str());
            println!("║ Phone:   {:<52}║", delivery.customer_phone);
            println!("║ Email:   {:<52}║", delivery.customer_email);
            println!("║ Code:    {:<52}║", delivery.code.as_str());
            println!("╚══════════════════════════════════════════════════════════════╝\n");

            Ok(DeliveryReceipt {
                channel: "console",
                reference: None,
            })
        })
    }

    fn verify(&self) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventday_core::{EventId, OtpCode, OtpPurpose};

    #[tokio::test]
    async fn console_delivery_always_succeeds() {
        let notifier = ConsoleNotifier::new();
        notifier.verify().await.unwrap();
        let receipt = notifier
            .send_otp(OtpDelivery {
                event_id: EventId::new(),
                event_name: "Launch".into(),
                customer_name: "Ana".into(),
                customer_email: "ana@example.com".into(),
                customer_phone: "+15550199".into(),
                purpose: OtpPurpose::Start,
                code: OtpCode::from_number(123_456),
                expires_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.channel, "console");
    }
}
