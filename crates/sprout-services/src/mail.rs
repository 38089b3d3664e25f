//! Outbound email. `SendGridMailer` talks to the SendGrid v3 HTTP API;
//! `LogMailer` only logs, for local runs without credentials.

#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
            endpoint: SENDGRID_ENDPOINT.to_string(),
        }
    }

    fn payload(&self, recipient: &str, subject: &str, body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": recipient }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/html", "value": body }],
        })
    }
}

#[async_trait]
impl EmailSender for SendGridMailer {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(recipient, subject, body))
            .send()
            .await?
            .error_for_status()?;

        info!(recipient, subject, "email sent");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl EmailSender for LogMailer {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(recipient, subject, bytes = body.len(), "email not sent (no mail transport configured)");
        Ok(())
    }
}

/// A message captured by [`MemoryMailer`].
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message in memory instead of delivering it. Only built for
/// tests and with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentEmail>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl EmailSender for MemoryMailer {
    async fn send_email(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.outbox
            .lock()
            .map_err(|e| anyhow::anyhow!("outbox lock poisoned: {}", e))?
            .push(SentEmail {
                recipient: recipient.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sendgrid_payload_shape() {
        let mailer = SendGridMailer::new("key".into(), "noreply@sprout.test".into());
        let payload = mailer.payload("ann@example.com", "Hello", "<p>hi</p>");

        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "ann@example.com");
        assert_eq!(payload["from"]["email"], "noreply@sprout.test");
        assert_eq!(payload["subject"], "Hello");
        assert_eq!(payload["content"][0]["type"], "text/html");
        assert_eq!(payload["content"][0]["value"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::new();
        mailer.send_email("a@b.c", "s", "b").await.unwrap();

        assert_eq!(
            mailer.sent(),
            vec![SentEmail {
                recipient: "a@b.c".into(),
                subject: "s".into(),
                body: "b".into(),
            }]
        );
    }
}
