use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::SmtpConfig;

use super::{NotificationSender, SenderError};

/// SMTP sender for owner-facing email.
///
/// With no SMTP configuration the sender degrades to log-only delivery, so
/// an unconfigured deployment still exercises the full alerting path.
pub struct EmailSender {
    config: Option<SmtpConfig>,
}

impl EmailSender {
    pub fn new(config: Option<SmtpConfig>) -> Self {
        Self { config }
    }

    fn build_message(
        config: &SmtpConfig,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<Message, SenderError> {
        Ok(Message::builder()
            .from(config.from_address.parse()?)
            .to(recipient.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?)
    }

    fn transport(config: &SmtpConfig) -> Result<SmtpTransport, SenderError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = if config.port == 465 {
            SmtpTransport::relay(&config.host)?
        } else {
            SmtpTransport::starttls_relay(&config.host)?
        };
        Ok(transport.credentials(credentials).port(config.port).build())
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), SenderError> {
        let Some(config) = &self.config else {
            info!(recipient, subject, "email (mock): no SMTP configured, logging only");
            return Ok(());
        };

        let message = Self::build_message(config, recipient, subject, html_body)?;
        let transport = Self::transport(config)?;

        // lettre's SmtpTransport is blocking; keep it off the runtime.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| SenderError::SendFailed(format!("send task failed: {e}")))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "user".to_string(),
            password: "pass".to_string(),
            from_address: "alerts@example.com".to_string(),
        }
    }

    #[test]
    fn builds_html_message() {
        let message = EmailSender::build_message(
            &test_config(),
            "owner@example.com",
            "Test subject",
            "<p>hello</p>",
        );
        assert!(message.is_ok());
    }

    #[test]
    fn rejects_invalid_recipient() {
        let message =
            EmailSender::build_message(&test_config(), "not-an-address", "Subject", "<p></p>");
        assert!(matches!(message, Err(SenderError::Address(_))));
    }

    #[tokio::test]
    async fn unconfigured_sender_logs_and_succeeds() {
        let sender = EmailSender::new(None);
        let result = sender.send("owner@example.com", "Subject", "<p></p>").await;
        assert!(result.is_ok());
    }
}
