//! Relay engine: one cooperative polling task per channel, forwarding new chat
//! messages to that channel's webhook exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chatty_config::{DedupScope, DeliveryFailurePolicy, RelaySettings, StartMode};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    format_message, most_recent, Channel, ChatMessage, ChatSource, DedupSet, RelayCredentials,
    RelayError, WebhookSink,
};

const STATUS_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Running,
    Stopped,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ChannelStatus::Running => "Running",
            ChannelStatus::Stopped => "Stopped",
        })
    }
}

/// Emitted after every start/stop transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub channel: Channel,
    pub status: ChannelStatus,
}

/// Runtime knobs, derived from [`RelaySettings`].
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub poll_interval: Duration,
    pub catch_up_count: usize,
    pub max_backoff: Option<Duration>,
    pub start_mode: StartMode,
    pub dedup_scope: DedupScope,
    pub on_delivery_failure: DeliveryFailurePolicy,
}

impl RelayOptions {
    /// Delay before the next poll after `failures` consecutive failed fetches.
    pub fn delay_after(&self, failures: u32) -> Duration {
        match self.max_backoff {
            Some(max) if failures > 0 => self
                .poll_interval
                .saturating_mul(1u32 << failures.min(16))
                .min(max.max(self.poll_interval)),
            _ => self.poll_interval,
        }
    }
}

impl From<&RelaySettings> for RelayOptions {
    fn from(s: &RelaySettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            catch_up_count: s.catch_up_count,
            max_backoff: s.max_backoff_secs.map(Duration::from_secs),
            start_mode: s.start_mode,
            dedup_scope: s.dedup_scope,
            on_delivery_failure: s.on_delivery_failure,
        }
    }
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

#[derive(Debug, Default)]
struct ChannelState {
    active: AtomicBool,
    /// Bumped on every activation; a loop only runs while its generation is current.
    generation: AtomicU64,
    last_seen_id: AtomicI64,
}

enum PollOutcome {
    Forwarded(usize),
    FetchFailed,
    /// The channel was stopped while the fetch was in flight.
    Discarded,
}

struct Shared {
    source: Arc<dyn ChatSource>,
    sink: Arc<dyn WebhookSink>,
    options: RelayOptions,
    credentials: RwLock<RelayCredentials>,
    states: [ChannelState; 3],
    dedup: DedupSet,
    status_tx: broadcast::Sender<StatusUpdate>,
}

/// Owns per-channel relay state and the background polling tasks.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct RelayEngine {
    shared: Arc<Shared>,
}

impl RelayEngine {
    pub fn new(
        source: Arc<dyn ChatSource>,
        sink: Arc<dyn WebhookSink>,
        options: RelayOptions,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_BUFFER);
        let dedup = DedupSet::new(options.dedup_scope);
        debug!(
            "Relay engine ready (poll every {:?}, dedup scope {:?})",
            options.poll_interval,
            dedup.scope()
        );
        Self {
            shared: Arc::new(Shared {
                source,
                sink,
                options,
                credentials: RwLock::new(RelayCredentials::default()),
                states: Default::default(),
                dedup,
                status_tx,
            }),
        }
    }

    /// Replace the API key and webhooks. Running loops pick them up on their next
    /// fetch or send; the dedup record is untouched.
    pub async fn configure(&self, credentials: RelayCredentials) {
        *self.shared.credentials.write().await = credentials;
        debug!("Relay credentials updated");
    }

    /// Activate `channel`: replay the most recent messages, then start polling.
    ///
    /// With [`StartMode::Toggle`] a running channel is stopped instead.
    pub async fn start(&self, channel: Channel) -> Result<ChannelStatus, RelayError> {
        {
            let creds = self.shared.credentials.read().await;
            if creds.api_key.trim().is_empty() {
                warn!("Cannot start {channel} relay: API key not configured");
                return Err(RelayError::MissingApiKey);
            }
            if creds.webhooks.get(channel).is_none() {
                warn!("Cannot start {channel} relay: webhook URL not configured");
                return Err(RelayError::MissingWebhook(channel));
            }
        }

        let state = self.shared.state(channel);
        if state.active.load(Ordering::SeqCst) {
            return Ok(match self.shared.options.start_mode {
                StartMode::Toggle => self.stop(channel),
                StartMode::Idempotent => {
                    debug!("{channel} relay already running");
                    ChannelStatus::Running
                }
            });
        }
        if state
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Lost a race with a concurrent start.
            return Ok(ChannelStatus::Running);
        }
        let generation = state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("{channel} relay started");
        self.shared.notify(channel, ChannelStatus::Running);

        if let Err(e) = self.shared.catch_up(channel).await {
            self.shared.halt(channel, generation, &e);
            return Ok(self.status(channel));
        }

        let shared = self.shared.clone();
        tokio::spawn(async move {
            poll_loop(shared, channel, generation).await;
        });

        Ok(self.status(channel))
    }

    /// Clear the channel's active flag. The loop exits at its next iteration
    /// boundary; an in-flight request is left to finish and its result dropped.
    pub fn stop(&self, channel: Channel) -> ChannelStatus {
        if self.shared.state(channel).active.swap(false, Ordering::SeqCst) {
            info!("{channel} relay stopped");
            self.shared.notify(channel, ChannelStatus::Stopped);
        }
        ChannelStatus::Stopped
    }

    /// Stop every channel without waiting for the loops to exit.
    pub fn shutdown(&self) {
        for channel in Channel::ALL {
            self.stop(channel);
        }
    }

    pub fn status(&self, channel: Channel) -> ChannelStatus {
        if self.shared.state(channel).active.load(Ordering::SeqCst) {
            ChannelStatus::Running
        } else {
            ChannelStatus::Stopped
        }
    }

    pub fn statuses(&self) -> Vec<(Channel, ChannelStatus)> {
        Channel::ALL.iter().map(|&c| (c, self.status(c))).collect()
    }

    pub fn last_seen_id(&self, channel: Channel) -> i64 {
        self.shared.state(channel).last_seen_id.load(Ordering::SeqCst)
    }

    /// Number of message ids recorded as forwarded.
    pub fn sent_count(&self) -> usize {
        self.shared.dedup.len()
    }

    pub fn was_sent(&self, channel: Channel, id: i64) -> bool {
        self.shared.dedup.contains(channel, id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.shared.status_tx.subscribe()
    }

    /// Forward the most recent messages of `channel`, oldest first. Does not move
    /// the channel's last-seen id.
    pub async fn catch_up(&self, channel: Channel) -> Result<usize> {
        self.shared.catch_up(channel).await
    }

    /// Run a single poll iteration regardless of the channel's active flag.
    pub async fn poll_once(&self, channel: Channel) -> Result<usize> {
        match self.shared.poll(channel, None).await? {
            PollOutcome::Forwarded(n) => Ok(n),
            PollOutcome::FetchFailed | PollOutcome::Discarded => Ok(0),
        }
    }
}

async fn poll_loop(shared: Arc<Shared>, channel: Channel, generation: u64) {
    debug!("{channel} poll loop running (generation {generation})");
    let mut failures: u32 = 0;

    while shared.is_current(channel, generation) {
        match shared.poll(channel, Some(generation)).await {
            Ok(PollOutcome::Forwarded(n)) => {
                failures = 0;
                if n > 0 {
                    debug!("{channel}: forwarded {n} new message(s)");
                }
            }
            Ok(PollOutcome::FetchFailed) => failures = failures.saturating_add(1),
            Ok(PollOutcome::Discarded) => break,
            Err(e) => {
                shared.halt(channel, generation, &e);
                break;
            }
        }
        tokio::time::sleep(shared.options.delay_after(failures)).await;
    }

    debug!("{channel} poll loop exited (generation {generation})");
}

impl Shared {
    fn state(&self, channel: Channel) -> &ChannelState {
        &self.states[channel.index()]
    }

    fn is_current(&self, channel: Channel, generation: u64) -> bool {
        let state = self.state(channel);
        state.active.load(Ordering::SeqCst)
            && state.generation.load(Ordering::SeqCst) == generation
    }

    fn notify(&self, channel: Channel, status: ChannelStatus) {
        // No subscribers is fine.
        let _ = self.status_tx.send(StatusUpdate { channel, status });
    }

    /// Deactivate a channel after a delivery failure, unless it was already
    /// stopped or restarted by someone else.
    fn halt(&self, channel: Channel, generation: u64, err: &anyhow::Error) {
        error!("{channel} relay halted after delivery failure: {err:#}");
        let state = self.state(channel);
        if state.generation.load(Ordering::SeqCst) == generation
            && state.active.swap(false, Ordering::SeqCst)
        {
            self.notify(channel, ChannelStatus::Stopped);
        }
    }

    async fn fetch(&self, channel: Channel) -> Option<Vec<ChatMessage>> {
        let api_key = self.credentials.read().await.api_key.clone();
        match self.source.fetch(channel, &api_key).await {
            Ok(messages) => Some(messages),
            Err(e) => {
                debug!("{channel} chat fetch failed: {e:#}");
                None
            }
        }
    }

    async fn catch_up(&self, channel: Channel) -> Result<usize> {
        let Some(messages) = self.fetch(channel).await else {
            return Ok(0);
        };
        let mut forwarded = 0;
        for msg in most_recent(messages, self.options.catch_up_count) {
            if self.deliver(channel, &msg).await? {
                forwarded += 1;
            }
        }
        Ok(forwarded)
    }

    async fn poll(&self, channel: Channel, generation: Option<u64>) -> Result<PollOutcome> {
        let Some(messages) = self.fetch(channel).await else {
            return Ok(PollOutcome::FetchFailed);
        };
        if let Some(generation) = generation {
            if !self.is_current(channel, generation) {
                return Ok(PollOutcome::Discarded);
            }
        }

        let last_seen = &self.state(channel).last_seen_id;
        let mut forwarded = 0;
        // API order, not time order: each id above the running maximum advances it.
        for msg in messages {
            let previous = last_seen.fetch_max(msg.id, Ordering::SeqCst);
            if msg.id > previous && self.deliver(channel, &msg).await? {
                forwarded += 1;
            }
        }
        Ok(PollOutcome::Forwarded(forwarded))
    }

    /// Forward one message, applying the delivery failure policy.
    /// Errors only escape under [`DeliveryFailurePolicy::StopChannel`].
    async fn deliver(&self, channel: Channel, msg: &ChatMessage) -> Result<bool> {
        match self.forward(channel, msg).await {
            Ok(sent) => Ok(sent),
            Err(e) => match self.options.on_delivery_failure {
                DeliveryFailurePolicy::Continue => {
                    warn!("{channel}: failed to deliver message {}: {e:#}", msg.id);
                    Ok(false)
                }
                DeliveryFailurePolicy::StopChannel => Err(e),
            },
        }
    }

    async fn forward(&self, channel: Channel, msg: &ChatMessage) -> Result<bool> {
        if !self.dedup.mark_sent(channel, msg.id) {
            debug!("{channel}: message {} already sent, skipping", msg.id);
            return Ok(false);
        }

        let url = self
            .credentials
            .read()
            .await
            .webhooks
            .get(channel)
            .map(str::to_owned);
        let Some(url) = url else {
            debug!("{channel}: no webhook configured, dropping message {}", msg.id);
            return Ok(false);
        };

        self.sink.post(&url, &format_message(msg)).await?;
        Ok(true)
    }
}
