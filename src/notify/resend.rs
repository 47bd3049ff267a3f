use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::model::{SendEmailRequest, SendEmailResponse};
use super::{Notification, NotificationSink, SenderRole};
use crate::config::{Config, Senders};
use crate::error::SendError;
use crate::model::Recipient;

const RESEND_API_BASE: &str = "https://api.resend.com/";

/// Email delivery over the Resend HTTP API.
#[derive(Clone)]
pub struct ResendClient {
    http: Client,
    base_url: Url,
    api_key: String,
    senders: Senders,
}

impl fmt::Debug for ResendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ResendClient {
    pub fn new(api_key: String, senders: Senders, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(RESEND_API_BASE).context("invalid default Resend URL")?;
        Self::with_base_url(api_key, senders, base_url, timeout)
    }

    pub fn with_base_url(
        api_key: String,
        senders: Senders,
        base_url: Url,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("chirp-digest/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            senders,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.email.base_url).context("invalid email.base_url")?;
        Self::with_base_url(
            cfg.email.api_key.clone(),
            cfg.email.senders.clone(),
            base_url,
            Duration::from_secs(cfg.email.timeout_seconds),
        )
    }

    fn sender_for(&self, role: SenderRole) -> &str {
        match role {
            SenderRole::Daily => &self.senders.daily,
            SenderRole::Alerts => &self.senders.alerts,
            SenderRole::Welcome => &self.senders.welcome,
        }
    }

    pub fn build_email(&self, recipient: &Recipient, notification: &Notification) -> SendEmailRequest {
        build_email_request(
            self.sender_for(notification.sender_role()),
            recipient,
            notification,
        )
    }

    pub fn build_request(&self, body: &SendEmailRequest) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("emails")
            .context("invalid Resend base URL")?;
        self.http
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .build()
            .context("failed to build Resend request")
    }

    async fn execute_send(&self, body: &SendEmailRequest) -> Result<String, SendError> {
        let request = self
            .build_request(body)
            .map_err(|err| SendError::Request(format!("{err:#}")))?;
        debug!(url = %request.url(), to = ?body.to, subject = %body.subject, "sending email");

        let res = self.http.execute(request).await?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("Rate limited by Resend: {}", body);
            return Err(SendError::RateLimited(body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: SendEmailResponse = res.json().await?;
        debug!(message_id = %payload.id, "email accepted");
        Ok(payload.id)
    }
}

#[async_trait]
impl NotificationSink for ResendClient {
    async fn send(
        &self,
        recipient: &Recipient,
        notification: &Notification,
    ) -> Result<(), SendError> {
        if recipient.email.trim().is_empty() {
            return Err(SendError::InvalidRecipient("empty email address".into()));
        }
        let body = self.build_email(recipient, notification);
        self.execute_send(&body).await.map(|_| ())
    }
}

pub fn build_email_request(
    from: &str,
    recipient: &Recipient,
    notification: &Notification,
) -> SendEmailRequest {
    SendEmailRequest {
        from: from.to_string(),
        to: vec![recipient.email.clone()],
        subject: notification.subject(),
        text: notification.text_body(),
    }
}
