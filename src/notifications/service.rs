use std::sync::Arc;

use tracing::warn;

use super::senders::NotificationSender;

/// Fire-and-forget notification facade used by the engines.
///
/// Delivery failure is logged and swallowed: a dead SMTP relay must never
/// fail a monitoring, backup, or security job.
pub struct NotificationService {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationService {
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, recipient: &str, subject: &str, html_body: &str) {
        if let Err(e) = self.sender.send(recipient, subject, html_body).await {
            warn!(recipient, subject, error = %e, "notification delivery failed");
        }
    }

    pub async fn send_downtime_alert(
        &self,
        recipient: &str,
        website_name: &str,
        website_url: &str,
        detail: &str,
    ) {
        let subject = format!("ALERT: {website_name} is DOWN");
        let body = format!(
            "<h2>Website Down Alert</h2>\
             <p>Your website <strong>{website_name}</strong> is currently unreachable.</p>\
             <p><strong>Website:</strong> <a href=\"{website_url}\">{website_url}</a></p>\
             <p><strong>{detail}</strong></p>\
             <p><small>This is an automated alert. If this is incorrect, check your website \
             manually or adjust monitoring settings.</small></p>"
        );
        self.send(recipient, &subject, &body).await;
    }

    pub async fn send_recovery_alert(
        &self,
        recipient: &str,
        website_name: &str,
        website_url: &str,
    ) {
        let subject = format!("RECOVERED: {website_name} is back online");
        let body = format!(
            "<h2>Website Recovery Alert</h2>\
             <p>Your website <strong>{website_name}</strong> is now back online.</p>\
             <p><strong>Website:</strong> <a href=\"{website_url}\">{website_url}</a></p>"
        );
        self.send(recipient, &subject, &body).await;
    }

    pub async fn send_backup_failure(
        &self,
        recipient: &str,
        website_name: &str,
        error_detail: &str,
    ) {
        let subject = format!("Backup failed for {website_name}");
        let body = format!(
            "<p>The automated backup for <strong>{website_name}</strong> failed.</p>\
             <p>Error: {error_detail}</p>"
        );
        self.send(recipient, &subject, &body).await;
    }

    pub async fn send_security_alert(
        &self,
        recipient: &str,
        website_name: &str,
        findings: &[String],
    ) {
        let subject = format!("Security Alert: {website_name}");
        let items: String = findings
            .iter()
            .map(|f| format!("<li>{f}</li>"))
            .collect();
        let body = format!(
            "<h2>Security Alert</h2>\
             <p>Security scan found issues on <strong>{website_name}</strong>:</p>\
             <ul>{items}</ul>"
        );
        self.send(recipient, &subject, &body).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::senders::SenderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(
            &self,
            recipient: &str,
            subject: &str,
            _html_body: &str,
        ) -> Result<(), SenderError> {
            if self.fail {
                return Err(SenderError::SendFailed("relay down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), subject.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn downtime_subject_names_the_website() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            fail: false,
        });
        let service = NotificationService::new(sender.clone());

        service
            .send_downtime_alert("owner@example.com", "Shop", "https://shop.example", "Status: 503")
            .await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "owner@example.com");
        assert!(sent[0].1.contains("Shop"));
        assert!(sent[0].1.contains("DOWN"));
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
            fail: true,
        });
        let service = NotificationService::new(sender);

        // Must not panic or surface the error.
        service
            .send_recovery_alert("owner@example.com", "Shop", "https://shop.example")
            .await;
    }
}
