//! Outbound credential email.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

pub const RESEND_API_URL: &str = "https://api.resend.com";
pub const DEFAULT_MAIL_FROM: &str = "Research Study <no-reply@studyboard.local>";
const CREDENTIALS_SUBJECT: &str = "Your study login code and password";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail client unavailable: {0}")]
    Client(String),
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_credentials(&self, to: &str, code: &str, password: &str)
        -> Result<(), MailError>;
}

/// Used when no mail provider is configured; nothing leaves the process.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_credentials(
        &self,
        to: &str,
        code: &str,
        _password: &str,
    ) -> Result<(), MailError> {
        warn!(to, code, "email not sent: mail service not configured");
        Ok(())
    }
}

pub struct ResendMailer {
    base_url: String,
    api_key: String,
    from: String,
    client: Client,
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

impl ResendMailer {
    pub fn new(mut base_url: String, api_key: String, from: String) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| MailError::Client(err.to_string()))?;
        let trimmed_len = base_url.trim_end_matches('/').len();
        base_url.truncate(trimmed_len);
        Ok(Self {
            base_url,
            api_key,
            from,
            client,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_credentials(
        &self,
        to: &str,
        code: &str,
        password: &str,
    ) -> Result<(), MailError> {
        let body = ResendEmail {
            from: &self.from,
            to: [to],
            subject: CREDENTIALS_SUBJECT,
            html: credentials_html(code, password),
        };
        self.client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| MailError::Delivery(err.to_string()))?;
        info!(to, "credentials email sent");
        Ok(())
    }
}

pub fn credentials_html(code: &str, password: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
<h2>Thank you for joining the study!</h2>\
<p>Your login credentials have been generated:</p>\
<p><strong>Login Code:</strong> <code>{}</code></p>\
<p><strong>Password:</strong> <code>{}</code></p>\
<p>Please keep this information safe and do not share it with anyone.</p>\
</div>",
        escape_html(code),
        escape_html(password)
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
