use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Outgoing mail. Failures are returned to the caller, never swallowed.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Sends through the Resend HTTP API.
pub struct ResendEmailSender {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl ResendEmailSender {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&ResendPayload {
                from: &self.from,
                to: [to],
                subject,
                html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Resend rejected email ({}): {}", status, body);
        }
        Ok(())
    }
}

/// Development sender: writes the message to the log instead of delivering it.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        info!(%to, %subject, "Email not sent (no provider configured):\n{}", html);
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use recording::{RecordingEmailSender, SentEmail};

#[cfg(any(test, feature = "test-support"))]
mod recording {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use super::EmailSender;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub html: String,
    }

    /// Keeps every message in memory. Can be switched to fail for error-path tests.
    #[derive(Default)]
    pub struct RecordingEmailSender {
        sent: Mutex<Vec<SentEmail>>,
        failing: AtomicBool,
    }

    impl RecordingEmailSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                bail!("mail provider unavailable");
            }
            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(SentEmail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    html: html.to_string(),
                });
            Ok(())
        }
    }
}

pub fn reset_password_email(link: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <h1>Reset your Bidhub password</h1>
    <p>Someone asked to reset the password for this account. If that was you, follow the link below. It works once and expires in 24 hours.</p>
    <p><a href="{link}">Reset password</a></p>
    <p>If you did not ask for this, you can ignore this email.</p>
  </body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_sender_captures_and_fails_on_demand() {
        let sender = RecordingEmailSender::new();
        sender.send("a@b.com", "Hi", "<p>hi</p>").await.unwrap();

        sender.set_failing(true);
        assert!(sender.send("a@b.com", "Hi", "<p>hi</p>").await.is_err());

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
    }

    #[test]
    fn reset_email_embeds_link() {
        let html = reset_password_email("http://localhost:3000/reset-password/abc");
        assert!(html.contains(r#"href="http://localhost:3000/reset-password/abc""#));
    }
}
