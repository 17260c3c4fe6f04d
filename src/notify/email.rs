use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::notify::{ChangeNotifier, PriceChangeEvent};
use crate::utils::error::{AppError, Result};

/// SMTP delivery of price change notices, one plain-text message per
/// recipient.
pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn format_subject(&self) -> String {
        "Price change on tracked listing".to_string()
    }

    fn format_body(&self, event: &PriceChangeEvent) -> String {
        let mut body = String::new();
        body.push_str("Hello!\n\n");
        body.push_str("The price of a listing you follow has changed.\n\n");
        body.push_str(&format!("Listing: {}\n", event.listing_url));
        body.push_str(&format!(
            "Old price: {} {}\n",
            event.old_price, event.old_currency
        ));
        body.push_str(&format!(
            "New price: {} {}\n\n",
            event.new_price, event.new_currency
        ));
        body.push_str("Thank you for using our service!\n");
        body
    }

    fn sender(&self) -> Result<Mailbox> {
        format!("{} <{}>", self.config.from_name, self.config.from_address)
            .parse()
            .map_err(|e| AppError::Notify(format!("invalid sender address: {}", e)))
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let mut builder = if self.config.use_tls {
            SmtpTransport::relay(&self.config.host)
                .map_err(|e| AppError::Notify(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.host)
        }
        .port(self.config.port);

        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl ChangeNotifier for EmailNotifier {
    async fn notify(&self, email: &str, event: &PriceChangeEvent) -> Result<()> {
        let recipient: Mailbox = email
            .parse()
            .map_err(|e| AppError::Notify(format!("invalid recipient {}: {}", email, e)))?;

        let message = Message::builder()
            .from(self.sender()?)
            .to(recipient)
            .subject(self.format_subject())
            .body(self.format_body(event))
            .map_err(|e| AppError::Notify(e.to_string()))?;

        self.transport()?
            .send(&message)
            .map_err(|e| AppError::Notify(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_event() -> PriceChangeEvent {
        PriceChangeEvent {
            listing_url: "https://www.olx.pl/d/oferta/test-ad-IDabc.html".to_string(),
            old_price: 1000,
            old_currency: "PLN".to_string(),
            new_price: 1500,
            new_currency: "PLN".to_string(),
        }
    }

    fn test_notifier() -> EmailNotifier {
        EmailNotifier::new(SmtpConfig::default())
    }

    #[test]
    fn test_body_carries_old_and_new_price() {
        let body = test_notifier().format_body(&test_event());

        assert!(body.contains("https://www.olx.pl/d/oferta/test-ad-IDabc.html"));
        assert!(body.contains("Old price: 1000 PLN"));
        assert!(body.contains("New price: 1500 PLN"));
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            test_notifier().format_subject(),
            "Price change on tracked listing"
        );
    }

    #[test]
    fn test_sender_uses_configured_identity() {
        let sender = test_notifier().sender().unwrap();
        assert_eq!(sender.email.to_string(), "noreply@pricewatch.local");
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_a_notify_error() {
        let result = test_notifier().notify("not-an-address", &test_event()).await;
        assert!(matches!(result, Err(AppError::Notify(_))));
    }
}
