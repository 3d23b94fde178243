//! HTTP adapters plugging the relay engine into the chat API and Discord.

pub mod cartel_api;
pub mod discord;

use std::time::Duration;

use anyhow::{Context, Result};

pub use cartel_api::CartelChatApi;
pub use discord::DiscordWebhook;

/// Shared client construction. `None` leaves requests without a deadline.
pub(crate) fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatty_core::{Channel, ChannelStatus, RelayCredentials, RelayEngine, RelayOptions, Webhooks};
    use mockito::Matcher;

    use super::*;

    #[tokio::test]
    async fn start_relays_catch_up_through_real_adapters() {
        let mut api = mockito::Server::new_async().await;
        let mut hooks = mockito::Server::new_async().await;

        let _chat = api
            .mock("GET", "/api/chat")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("type".into(), "global".into()),
                Matcher::UrlEncoded("key".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "globalChat": [
                        {"id": 2, "posted": "200", "name": "Bo", "message": "second"},
                        {"id": 1, "posted": "100", "name": "Al", "message": "first"}
                    ]
                })
                .to_string(),
            )
            .expect_at_least(1)
            .create_async()
            .await;
        let webhook = hooks
            .mock("POST", "/hook/global")
            .match_body(Matcher::Regex(r#"\*\*(Al|Bo)\*\*"#.into()))
            .with_status(204)
            .expect(2)
            .create_async()
            .await;

        let source = Arc::new(CartelChatApi::new(&api.url(), None).unwrap());
        let sink = Arc::new(DiscordWebhook::new(None).unwrap());
        let options = RelayOptions {
            poll_interval: Duration::from_millis(20),
            ..RelayOptions::default()
        };
        let engine = RelayEngine::new(source, sink, options);
        engine
            .configure(RelayCredentials::new(
                "secret",
                Webhooks::default().with(Channel::Global, format!("{}/hook/global", hooks.url())),
            ))
            .await;

        assert_eq!(
            engine.start(Channel::Global).await.unwrap(),
            ChannelStatus::Running
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.shutdown();

        // Two catch-up posts; later polls see the same ids and stay quiet.
        webhook.assert_async().await;
        assert_eq!(engine.last_seen_id(Channel::Global), 2);
    }
}
