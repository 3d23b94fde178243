//! Chat API client.
//!
//! `GET {base}/api/chat?type=<channel>&key=<apiKey>` returns an object whose
//! `<channel>Chat` field holds the channel's current messages.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::warn;
use url::Url;

use chatty_core::{Channel, ChatMessage, ChatSource};

pub struct CartelChatApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl CartelChatApi {
    pub fn new(api_base: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base = api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)
            .with_context(|| format!("invalid chat API base URL '{api_base}'"))?
            .join("api/chat")?;

        Ok(Self {
            client: crate::http_client(timeout)?,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatSource for CartelChatApi {
    async fn fetch(&self, channel: Channel, api_key: &str) -> Result<Vec<ChatMessage>> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(&[("type", channel.as_str()), ("key", api_key)])
            .send()
            .await
            .with_context(|| format!("chat request for {channel} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("chat API returned {status} for {channel}");
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("chat API sent invalid JSON for {channel}"))?;
        Ok(parse_messages(&body, channel))
    }
}

/// Pull `<channel>Chat` out of a response body. A missing field is an empty
/// round; entries that don't look like messages are skipped.
fn parse_messages(body: &serde_json::Value, channel: Channel) -> Vec<ChatMessage> {
    let field = channel.response_field();
    let Some(items) = body.get(&field).and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(
            |item| match serde_json::from_value::<ChatMessage>(item.clone()) {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!("Skipping malformed {field} entry: {e}");
                    None
                }
            },
        )
        .collect()
}
