use chrono::Local;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::error::ErrorReporter;
use crate::feed::{FeedEvent, FeedSource};
use crate::state::DashboardState;

/// Local time of day, the way the chart labels its samples.
pub fn time_of_day() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

/// Single writer of [`DashboardState`].
///
/// Events are handled one at a time in arrival order; each accepted snapshot
/// produces a complete new state which is then published to every
/// [`watch::Receiver`] handed out by [`DashboardSession::new`].
pub struct DashboardSession {
    feed: Box<dyn FeedSource>,
    reporter: Arc<dyn ErrorReporter>,
    window_capacity: usize,
    clock: fn() -> String,
    state: DashboardState,
    publisher: watch::Sender<DashboardState>,
}

impl DashboardSession {
    pub fn new(
        feed: Box<dyn FeedSource>,
        reporter: Arc<dyn ErrorReporter>,
        window_capacity: usize,
    ) -> (Self, watch::Receiver<DashboardState>) {
        let (publisher, updates) = watch::channel(DashboardState::default());
        let session = DashboardSession {
            feed,
            reporter,
            window_capacity,
            clock: time_of_day,
            state: DashboardState::default(),
            publisher,
        };
        (session, updates)
    }

    pub fn with_clock(mut self, clock: fn() -> String) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.publisher.subscribe()
    }

    /// Activates the feed and returns the channel its events arrive on.
    ///
    /// Returns `None` when the feed is already delivering to an earlier
    /// receiver or the session has been torn down.
    pub fn activate(&mut self) -> Option<mpsc::UnboundedReceiver<FeedEvent>> {
        if self.state.is_torn_down() || self.feed.is_active() {
            debug!(action = "activate", component = "session", "Feed not reactivated");
            return None;
        }
        let (events, receiver) = mpsc::unbounded_channel();
        self.feed.activate(events);
        Some(receiver)
    }

    /// Applies one event. Returns whether the published state changed.
    pub fn handle_event(&mut self, event: FeedEvent) -> bool {
        if self.state.is_torn_down() {
            debug!(action = "discard", component = "session", "Event after teardown dropped");
            return false;
        }

        match event {
            FeedEvent::Snapshot(snapshot) => {
                let entries = snapshot.len();
                let next = self.state.apply(snapshot, (self.clock)(), self.window_capacity);
                self.publish(next);
                debug!(
                    action = "apply",
                    component = "session",
                    entries,
                    total = self.state.window().latest().map(|s| s.total).unwrap_or(0),
                    samples = self.state.window().len(),
                    "Snapshot applied"
                );
                true
            }
            FeedEvent::Error(error) => {
                self.reporter.report(&error);
                false
            }
        }
    }

    /// Stops the feed and moves to the terminal phase. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.feed.teardown();
        if !self.state.is_torn_down() {
            let next = self.state.torn_down();
            self.publish(next);
            info!(action = "teardown", component = "session", samples = self.state.window().len(), "Dashboard session ended");
        }
    }

    /// Drives the session until `shutdown` resolves, then tears it down.
    pub async fn run<S>(mut self, shutdown: S) -> DashboardState
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut events = match self.activate() {
            Some(events) => events,
            None => {
                (&mut shutdown).await;
                self.teardown();
                return std::mem::take(&mut self.state);
            }
        };

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => {
                        info!(action = "idle", component = "session", "Feed stopped delivering, waiting for shutdown");
                        (&mut shutdown).await;
                        break;
                    }
                },
            }
        }

        self.teardown();
        drop(events);
        std::mem::take(&mut self.state)
    }

    fn publish(&mut self, next: DashboardState) {
        self.state = next;
        self.publisher.send_replace(self.state.clone());
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.feed.teardown();
    }
}
