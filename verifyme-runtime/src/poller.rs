//! Inbox Poller
//!
//! Periodically lists the inbox and classifies every message it has not
//! seen before:
//! - Checks once immediately, then on every interval tick
//! - Skips the message the user dismissed
//! - Records the first artifact found to the result sink and stops
//! - Cancellation arrives through a watch channel

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use verifyme_core::Classifier;
use verifyme_mail::{MailError, Mailbox, Message, MessageSummary};

use crate::{FoundVerification, ResultSink, StoreError};

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between inbox checks in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum runtime in seconds (0 = unlimited)
    pub max_runtime_secs: u64,
    /// Message bodies fetched in parallel per tick
    pub max_concurrent_fetches: usize,
    /// Stop after the first artifact is recorded
    pub stop_on_found: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_runtime_secs: 0,
            max_concurrent_fetches: 4,
            stop_on_found: true,
        }
    }
}

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Created, not running
    Idle,
    /// Running its tick loop
    Polling,
    /// Finished: found, cancelled, timed out or failed
    Stopped,
}

/// Errors that end a polling run
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Mailbox error: {0}")]
    Mail(#[from] MailError),

    #[error("Result sink error: {0}")]
    Sink(#[from] StoreError),
}

/// Watches one inbox for verification messages
pub struct Poller {
    config: PollerConfig,
    mailbox: Arc<dyn Mailbox>,
    sink: Arc<dyn ResultSink>,
    classifier: Classifier,
    state: PollerState,
    observed: HashSet<String>,
}

impl Poller {
    pub fn new(
        config: PollerConfig,
        mailbox: Arc<dyn Mailbox>,
        sink: Arc<dyn ResultSink>,
        classifier: Classifier,
    ) -> Self {
        Self {
            config,
            mailbox,
            sink,
            classifier,
            state: PollerState::Idle,
            observed: HashSet::new(),
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Number of messages classified so far
    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// One pass over the inbox
    ///
    /// Returns what was recorded, in inbox order. Messages whose fetch
    /// failed are left unobserved and retried on the next pass.
    pub async fn poll_once(&mut self) -> Result<Vec<FoundVerification>, PollError> {
        let dismissed = self.sink.dismissed_id().await?;
        let messages = self.mailbox.list_messages().await?;

        let fresh: Vec<MessageSummary> = messages
            .into_iter()
            .filter(|m| !self.observed.contains(&m.id))
            .filter(|m| dismissed.as_deref() != Some(m.id.as_str()))
            .collect();

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        debug!("{} new messages in {}", fresh.len(), self.mailbox.address());

        let mailbox = Arc::clone(&self.mailbox);
        let fetched: Vec<(MessageSummary, Result<Message, MailError>)> = stream::iter(fresh)
            .map(|summary| {
                let mailbox = Arc::clone(&mailbox);
                async move {
                    let result = mailbox.fetch_message(&summary.id).await;
                    (summary, result)
                }
            })
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut found = Vec::new();

        for (summary, result) in fetched {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    warn!("Failed to fetch message {}: {}", summary.id, e);
                    continue;
                }
            };

            self.observed.insert(summary.id.clone());

            let Some(artifact) = self.classifier.classify_message(&message.email()) else {
                debug!("No verification artifact in message {}", message.id);
                continue;
            };

            info!(
                "Found {} in message {} ({})",
                artifact.kind(),
                message.id,
                message.subject
            );

            let verification = FoundVerification::new(artifact, &message.id, &message.subject);
            self.sink.record(&verification).await?;
            found.push(verification);

            if self.config.stop_on_found {
                break;
            }
        }

        Ok(found)
    }

    /// Poll until an artifact is found, the run times out, or `shutdown` flips
    ///
    /// Mailbox errors on a tick are logged and polling continues; sink
    /// errors end the run. Returns the most recent artifact recorded.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<FoundVerification>, PollError> {
        self.state = PollerState::Polling;

        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let start = Instant::now();
        let max_runtime = (self.config.max_runtime_secs > 0)
            .then(|| Duration::from_secs(self.config.max_runtime_secs));

        info!(
            "Polling {} every {}ms",
            self.mailbox.address(),
            self.config.poll_interval_ms
        );

        let mut last_found = None;

        let outcome = loop {
            if *shutdown.borrow() {
                info!("Poller cancelled");
                break Ok(last_found);
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Poller cancelled");
                        break Ok(last_found);
                    }
                    continue;
                }
            }

            if max_runtime.is_some_and(|max| start.elapsed() >= max) {
                warn!("Poller reached maximum runtime");
                break Ok(last_found);
            }

            match self.poll_once().await {
                Ok(found) => {
                    if let Some(latest) = found.into_iter().last() {
                        last_found = Some(latest);
                        if self.config.stop_on_found {
                            break Ok(last_found);
                        }
                    }
                }
                Err(PollError::Mail(e)) => {
                    warn!("Polling error: {}", e);
                }
                Err(e) => break Err(e),
            }
        };

        self.state = PollerState::Stopped;
        info!("Poller stopped after observing {} messages", self.observed.len());
        outcome
    }
}

/// Spawn a poller as a background task
///
/// Returns the task handle and the cancellation sender. Send `true` to
/// stop; dropping the sender stops the poller too.
pub fn spawn_poller(
    mut poller: Poller,
) -> (
    JoinHandle<Result<Option<FoundVerification>, PollError>>,
    watch::Sender<bool>,
) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { poller.run(shutdown_rx).await });
    (handle, shutdown_tx)
}
