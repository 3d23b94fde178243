//! Discord webhook delivery.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use chatty_core::WebhookSink;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

pub struct DiscordWebhook {
    client: reqwest::Client,
}

impl DiscordWebhook {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: crate::http_client(timeout)?,
        })
    }
}

#[async_trait]
impl WebhookSink for DiscordWebhook {
    /// Transport errors are returned. A non-2xx reply is only logged; the
    /// message is not retried.
    async fn post(&self, url: &str, content: &str) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .json(&WebhookPayload { content })
            .send()
            .await
            .context("webhook request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Webhook responded {status}: {body}");
        }
        Ok(())
    }
}
