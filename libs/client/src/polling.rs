//! Long-poll update stream.
//!
//! One worker task owns the cursor, fetches batches from an [`UpdatesSource`]
//! and pushes them one by one into a bounded channel. The cursor only moves
//! after a record has been accepted by the channel, so a consumer that applies
//! backpressure slows the fetch loop instead of losing events.
//!
//! An event that was fetched but not yet handed over when cancellation fires
//! is not delivered; the returned cursor still points at it, so the next
//! session starting from that cursor fetches it again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use maxbot_core::{UpdatesEnvelope, WebhookEvent};
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::{ConfigError, parse_var};
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Server-side long-wait passed as `timeout` to `getUpdates`.
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub buffer_size: usize,
    /// First update id to request.
    pub update_offset: i64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(25),
            retry_delay: Duration::from_secs(1),
            buffer_size: 100,
            update_offset: 0,
        }
    }
}

impl PollingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64, _>(&lookup, "MAXBOT_POLL_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MAXBOT_POLL_RETRY_DELAY_MS")? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "MAXBOT_POLL_BUFFER")? {
            if size == 0 {
                return Err(ConfigError::Invalid {
                    key: "MAXBOT_POLL_BUFFER",
                    value: size.to_string(),
                });
            }
            config.buffer_size = size;
        }
        if let Some(offset) = parse_var::<i64, _>(&lookup, "MAXBOT_POLL_OFFSET")? {
            config.update_offset = offset;
        }
        Ok(config)
    }
}

/// Delivery record placed on the polling channel.
///
/// Event records carry the event's own id; error records carry the offset
/// that was being requested when the failure happened.
#[derive(Debug)]
pub struct PollingUpdate {
    pub update_id: i64,
    pub outcome: Result<WebhookEvent, ClientError>,
}

impl PollingUpdate {
    fn event(event: WebhookEvent) -> Self {
        Self {
            update_id: event.update_id,
            outcome: Ok(event),
        }
    }

    fn error(offset: i64, err: ClientError) -> Self {
        Self {
            update_id: offset,
            outcome: Err(err),
        }
    }

    pub fn event_ref(&self) -> Option<&WebhookEvent> {
        self.outcome.as_ref().ok()
    }

    pub fn error_ref(&self) -> Option<&ClientError> {
        self.outcome.as_ref().err()
    }
}

/// Next update id to request. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCursor(i64);

impl UpdateCursor {
    pub fn new(offset: i64) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> i64 {
        self.0
    }

    pub fn advance_past(&mut self, update_id: i64) {
        self.0 = self.0.max(update_id.saturating_add(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Stopped,
}

/// Where the poll loop fetches batches from.
#[async_trait]
pub trait UpdatesSource: Send + Sync {
    async fn fetch_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<UpdatesEnvelope, ClientError>;
}

pub type SharedUpdatesSource = Arc<dyn UpdatesSource>;

/// Handle to a running polling worker.
pub struct PollingSession {
    updates: mpsc::Receiver<PollingUpdate>,
    worker: JoinHandle<UpdateCursor>,
    cancel: CancellationToken,
}

impl PollingSession {
    /// Next record; `None` once the worker stopped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<PollingUpdate> {
        self.updates.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the worker and returns the cursor to resume from.
    pub async fn shutdown(self) -> Result<UpdateCursor, JoinError> {
        self.cancel.cancel();
        self.worker.await
    }

    pub fn into_parts(self) -> (mpsc::Receiver<PollingUpdate>, JoinHandle<UpdateCursor>) {
        (self.updates, self.worker)
    }
}

/// Spawns the polling worker on the current tokio runtime.
pub fn start_polling(
    source: SharedUpdatesSource,
    config: PollingConfig,
    cancel: CancellationToken,
) -> PollingSession {
    let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
    let span = info_span!("maxbot.poll", start_offset = config.update_offset);
    let worker = tokio::spawn(run_poll_loop(source, config, cancel.clone(), tx).instrument(span));
    PollingSession {
        updates: rx,
        worker,
        cancel,
    }
}

/// Runs until `cancel` fires or the receiving side goes away, then returns
/// the cursor. Dropping `updates` on return closes the channel.
pub async fn run_poll_loop(
    source: SharedUpdatesSource,
    config: PollingConfig,
    cancel: CancellationToken,
    updates: mpsc::Sender<PollingUpdate>,
) -> UpdateCursor {
    let mut cursor = UpdateCursor::new(config.update_offset);
    let mut state = PollState::Running;
    info!(offset = cursor.offset(), "polling started");

    while state == PollState::Running {
        state = poll_once(&*source, &config, &cancel, &updates, &mut cursor).await;
    }

    info!(offset = cursor.offset(), "polling stopped");
    cursor
}

async fn poll_once(
    source: &dyn UpdatesSource,
    config: &PollingConfig,
    cancel: &CancellationToken,
    updates: &mpsc::Sender<PollingUpdate>,
    cursor: &mut UpdateCursor,
) -> PollState {
    if cancel.is_cancelled() {
        return PollState::Stopped;
    }

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return PollState::Stopped,
        fetched = source.fetch_updates(cursor.offset(), config.timeout) => fetched,
    };

    let envelope = match fetched {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(offset = cursor.offset(), error = %err, "polling request failed");
            counter!("maxbot_poll_errors_total", "class" => err.class().as_str()).increment(1);
            if !report_error(updates, cursor.offset(), err) {
                return PollState::Stopped;
            }
            return pause(cancel, config.retry_delay).await;
        }
    };

    if !envelope.ok {
        warn!(offset = cursor.offset(), "polling response not ok");
        return pause(cancel, config.retry_delay).await;
    }
    if envelope.result.is_empty() {
        return PollState::Running;
    }

    counter!("maxbot_updates_fetched_total").increment(envelope.result.len() as u64);
    for event in envelope.result {
        let update_id = event.update_id;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(offset = cursor.offset(), "polling stopped during delivery");
                return PollState::Stopped;
            }
            sent = updates.send(PollingUpdate::event(event)) => {
                if sent.is_err() {
                    info!("update receiver dropped");
                    return PollState::Stopped;
                }
                cursor.advance_past(update_id);
                debug!(update_id, "update delivered");
            }
        }
    }
    PollState::Running
}

/// Error records never block the loop: a full channel drops them.
/// Returns `false` when the receiver is gone.
fn report_error(updates: &mpsc::Sender<PollingUpdate>, offset: i64, err: ClientError) -> bool {
    match updates.try_send(PollingUpdate::error(offset, err)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            counter!("maxbot_poll_errors_dropped_total").increment(1);
            debug!(offset, "update channel full, dropping error record");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn pause(cancel: &CancellationToken, delay: Duration) -> PollState {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => PollState::Stopped,
        _ = sleep(delay) => PollState::Running,
    }
}
