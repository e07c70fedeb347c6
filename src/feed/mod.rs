//! Snapshot sources.
//!
//! A feed runs as one background task that only sends [`FeedEvent`]s; it never
//! touches dashboard state. Tearing a feed down aborts that task, which drops
//! the open connection or the pending timer together with any response still
//! in flight.

mod pull;
mod push;
mod sse;

pub use pull::PullFeed;
pub use push::PushFeed;
pub use sse::SseDecoder;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{Config, FeedMode};
use crate::error::FeedError;
use crate::models::domain::{DomainEntry, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Snapshot(Snapshot),
    Error(FeedError),
}

impl From<Result<Snapshot, FeedError>> for FeedEvent {
    fn from(result: Result<Snapshot, FeedError>) -> Self {
        match result {
            Ok(snapshot) => FeedEvent::Snapshot(snapshot),
            Err(error) => FeedEvent::Error(error),
        }
    }
}

pub trait FeedSource: Send {
    fn mode(&self) -> FeedMode;

    /// Starts delivering events. Activating an already active feed does nothing
    /// and drops `events`.
    fn activate(&mut self, events: UnboundedSender<FeedEvent>);

    /// Stops delivery and releases the transport. Safe to call repeatedly.
    fn teardown(&mut self);

    fn is_active(&self) -> bool;
}

/// Owns the background task of an active feed.
#[derive(Debug, Default)]
pub(crate) struct FeedTask {
    handle: Option<JoinHandle<()>>,
}

impl FeedTask {
    pub(crate) fn start<F>(&mut self, component: &'static str, run: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_running() {
            debug!(action = "activate", component, "Feed already active");
            return;
        }
        self.handle = Some(tokio::spawn(run));
        info!(action = "activate", component, "Feed activated");
    }

    pub(crate) fn stop(&mut self, component: &'static str) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!(action = "teardown", component, "Feed torn down");
        }
    }

    /// A task that ended on its own (push feed after a final error, or a
    /// consumer that went away) no longer counts, so the feed can start again.
    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |handle| !handle.is_finished())
    }
}

impl Drop for FeedTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Parses one payload: a JSON array of `{domain, count}` with non-empty domains.
pub fn parse_snapshot(payload: &[u8]) -> Result<Snapshot, FeedError> {
    let entries: Vec<DomainEntry> =
        serde_json::from_slice(payload).map_err(|e| FeedError::MalformedPayload(e.to_string()))?;

    if let Some(index) = entries.iter().position(|entry| entry.domain.is_empty()) {
        return Err(FeedError::MalformedPayload(format!("entry {} has an empty domain", index)));
    }

    Ok(Snapshot::from(entries))
}

pub fn build(config: &Config) -> Result<Box<dyn FeedSource>, FeedError> {
    let feed: Box<dyn FeedSource> = match config.feed_mode {
        FeedMode::Push => Box::new(PushFeed::new(config.live_url(), config.reconnect_after)?),
        FeedMode::Pull => Box::new(PullFeed::new(
            config.snapshot_url(),
            config.poll_interval,
            config.request_timeout,
        )?),
    };
    Ok(feed)
}

pub(crate) fn http_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client, FeedError> {
    builder
        .build()
        .map_err(|e| FeedError::Unsupported(format!("cannot build http client: {}", e)))
}
