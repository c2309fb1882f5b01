//! Outbound alert notifications.
//!
//! Monitors notify on execution, rejection, unresolved polling and worker
//! panics. Delivery failure is logged and never fatal to the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Alert sink used by the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body_html: &str)
        -> Result<(), NotifyError>;
}

/// Posts alerts as JSON to a configured webhook (a mail relay or chat
/// hook on the other side).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body_html: &str,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            recipient,
            subject,
            body: body_html,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                resp.status()
            )));
        }

        info!(recipient, subject, "alert delivered");
        Ok(())
    }
}

/// Fallback when no webhook is configured: record the alert in the log
/// and report success.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        _body_html: &str,
    ) -> Result<(), NotifyError> {
        warn!(recipient, subject, "notifier not configured; alert logged only");
        Ok(())
    }
}

/// Pick the notifier implied by the configuration.
pub fn from_config(config: &Config) -> Arc<dyn Notifier> {
    match &config.alert_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    }
}
