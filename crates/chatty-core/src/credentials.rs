use chatty_config::{Config, WebhooksConfig};

use crate::Channel;

/// Webhook target per channel. Blank entries count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Webhooks {
    urls: [String; 3],
}

impl Webhooks {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        let url = self.urls[channel.index()].trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn set(&mut self, channel: Channel, url: impl Into<String>) {
        self.urls[channel.index()] = url.into();
    }

    pub fn with(mut self, channel: Channel, url: impl Into<String>) -> Self {
        self.set(channel, url);
        self
    }
}

impl From<&WebhooksConfig> for Webhooks {
    fn from(cfg: &WebhooksConfig) -> Self {
        Self {
            urls: [cfg.global.clone(), cfg.trade.clone(), cfg.cartel.clone()],
        }
    }
}

/// API key plus webhook targets, replaceable at runtime via `RelayEngine::configure`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayCredentials {
    pub api_key: String,
    pub webhooks: Webhooks,
}

impl RelayCredentials {
    pub fn new(api_key: impl Into<String>, webhooks: Webhooks) -> Self {
        Self {
            api_key: api_key.into(),
            webhooks,
        }
    }
}

impl From<&Config> for RelayCredentials {
    fn from(cfg: &Config) -> Self {
        Self {
            api_key: cfg.api_key.trim().to_string(),
            webhooks: Webhooks::from(&cfg.webhooks),
        }
    }
}
