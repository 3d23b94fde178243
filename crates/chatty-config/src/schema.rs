use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Chat API key. Older config files wrote this as `api_key`.
    #[serde(alias = "api_key")]
    pub api_key: String,
    pub webhooks: WebhooksConfig,
    pub relay: RelaySettings,
}

/// One webhook URL per chat channel. An empty string means "not set".
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhooksConfig {
    pub global: String,
    pub trade: String,
    pub cartel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub api_base: String,
    pub poll_interval_ms: u64,
    /// Number of most recent messages replayed when a channel is switched on.
    pub catch_up_count: usize,
    /// Per-request HTTP timeout. Unset means requests may wait forever.
    pub http_timeout_secs: Option<u64>,
    /// Upper bound for the poll delay after repeated fetch failures.
    /// Unset keeps the fixed poll interval regardless of failures.
    pub max_backoff_secs: Option<u64>,
    pub start_mode: StartMode,
    pub dedup_scope: DedupScope,
    pub on_delivery_failure: DeliveryFailurePolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            api_base: "https://cartelempire.online".into(),
            poll_interval_ms: 2000,
            catch_up_count: 5,
            http_timeout_secs: None,
            max_backoff_secs: None,
            start_mode: StartMode::default(),
            dedup_scope: DedupScope::default(),
            on_delivery_failure: DeliveryFailurePolicy::default(),
        }
    }
}

/// What `start` does on a channel that is already running.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StartMode {
    /// Flip the active flag, so starting a running channel stops it.
    #[default]
    Toggle,
    /// Starting a running channel does nothing.
    Idempotent,
}

/// How forwarded message ids are remembered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DedupScope {
    /// One id space shared by every channel.
    #[default]
    Global,
    /// Ids are remembered per channel.
    PerChannel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryFailurePolicy {
    /// Log the failed post and keep polling.
    #[default]
    Continue,
    /// End the channel's polling activity.
    StopChannel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_reference_defaults() {
        let cfg: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(cfg.relay.poll_interval_ms, 2000);
        assert_eq!(cfg.relay.catch_up_count, 5);
        assert!(cfg.relay.http_timeout_secs.is_none());
        assert!(cfg.relay.max_backoff_secs.is_none());
        assert_eq!(cfg.relay.start_mode, StartMode::Toggle);
        assert_eq!(cfg.relay.dedup_scope, DedupScope::Global);
        assert_eq!(
            cfg.relay.on_delivery_failure,
            DeliveryFailurePolicy::Continue
        );
    }

    #[test]
    fn legacy_snake_case_record_is_accepted() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "api_key": "abc123",
            "webhooks": {
                "global": "https://discord.com/api/webhooks/1/g",
                "trade": "",
                "cartel": "https://discord.com/api/webhooks/3/c"
            }
        }))
        .unwrap();
        assert_eq!(cfg.api_key, "abc123");
        assert_eq!(cfg.webhooks.global, "https://discord.com/api/webhooks/1/g");
        assert!(cfg.webhooks.trade.is_empty());
        assert_eq!(cfg.webhooks.cartel, "https://discord.com/api/webhooks/3/c");
    }

    #[test]
    fn relay_knobs_parsed() {
        let cfg: Config = serde_json::from_value(serde_json::json!({
            "apiKey": "k",
            "relay": {
                "pollIntervalMs": 500,
                "httpTimeoutSecs": 10,
                "maxBackoffSecs": 60,
                "startMode": "idempotent",
                "dedupScope": "perChannel",
                "onDeliveryFailure": "stopChannel"
            }
        }))
        .unwrap();
        assert_eq!(cfg.relay.poll_interval_ms, 500);
        assert_eq!(cfg.relay.http_timeout_secs, Some(10));
        assert_eq!(cfg.relay.max_backoff_secs, Some(60));
        assert_eq!(cfg.relay.start_mode, StartMode::Idempotent);
        assert_eq!(cfg.relay.dedup_scope, DedupScope::PerChannel);
        assert_eq!(
            cfg.relay.on_delivery_failure,
            DeliveryFailurePolicy::StopChannel
        );
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.relay.api_base, "https://cartelempire.online");
    }

    #[test]
    fn saved_form_uses_camel_case() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert!(value.get("apiKey").is_some());
        assert!(value["relay"].get("catchUpCount").is_some());
    }
}
