//! Notifier implementations.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::Notifier;
use crate::notifications::Notification;

const WEBHOOK_TITLE: &str = "V2EX new notification";

/// Writes each notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            id = notification.id,
            kind = %notification.kind,
            "{notification}"
        );
        Ok(())
    }
}

/// Posts each notification as a form (`text`, `desp`) to a push webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let body = notification.to_string();
        self.client
            .post(&self.url)
            .form(&[("text", WEBHOOK_TITLE), ("desp", body.as_str())])
            .send()
            .await
            .context("Webhook request failed")?
            .error_for_status()
            .context("Webhook rejected notification")?;
        Ok(())
    }
}
