use super::Notifier;
use crate::event::NotificationRequest;
use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Form field carrying the message text
pub const FORM_FIELD: &str = "text";

/// Webhook configuration
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotifierConfig {
    /// Endpoint receiving `text=<message>` form posts
    #[serde(default)]
    pub webhook_url: String,
}

/// Failed webhook delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationDeliveryError {
    /// Connection refused, timeout, DNS failure...
    Transport(String),
    /// Endpoint answered with a non-2xx status
    Status { status: u16, body: String },
}

impl fmt::Display for NotificationDeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationDeliveryError::Transport(reason) => {
                write!(f, "webhook request failed: {}", reason)
            }
            NotificationDeliveryError::Status { status, body } => {
                write!(f, "webhook returned status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for NotificationDeliveryError {}

/// Result of one delivery attempt. Only logged; callers of `send` never see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16, body: String },
    Failed(NotificationDeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Posts relayed messages to a fixed HTTP endpoint
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let url = Url::parse(&config.webhook_url)
            .with_context(|| format!("Invalid webhook_url '{}'", config.webhook_url))?;

        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Perform exactly one POST and log what happened.
    ///
    /// Never retries. Uses the HTTP client's default timeouts.
    pub async fn deliver(&self, request: &NotificationRequest) -> DeliveryOutcome {
        debug!(url = %self.url, text = %request.text(), "Posting notification");

        let response = match self
            .http
            .post(self.url.clone())
            .form(&[(FORM_FIELD, request.text())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = NotificationDeliveryError::Transport(e.to_string());
                error!(url = %self.url, error = %err, "Notification delivery failed");
                return DeliveryOutcome::Failed(err);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = NotificationDeliveryError::Status {
                status: status.as_u16(),
                body,
            };
            error!(url = %self.url, error = %err, "Notification delivery failed");
            return DeliveryOutcome::Failed(err);
        }

        info!(status = status.as_u16(), body = %body, "Notification delivered");
        DeliveryOutcome::Delivered {
            status: status.as_u16(),
            body,
        }
    }

    /// Run `deliver` on the runtime without waiting for it.
    pub fn dispatch(&self, request: NotificationRequest) -> JoinHandle<DeliveryOutcome> {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.deliver(&request).await })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, request: NotificationRequest) {
        // Outcome is already logged by deliver
        drop(self.dispatch(request));
    }
}
