use reqwest::{Client, Url};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::{http_client, parse_snapshot, FeedEvent, FeedSource, FeedTask};
use crate::config::FeedMode;
use crate::error::FeedError;
use crate::models::domain::Snapshot;

const COMPONENT: &str = "pull_feed";

/// Polls the snapshot endpoint: once on activation, then every `interval`.
///
/// A failed request is reported and the schedule carries on.
pub struct PullFeed {
    client: Client,
    url: Url,
    interval: Duration,
    task: FeedTask,
}

impl PullFeed {
    pub fn new(url: Url, interval: Duration, request_timeout: Duration) -> Result<Self, FeedError> {
        Ok(PullFeed {
            client: http_client(Client::builder().timeout(request_timeout))?,
            url,
            interval,
            task: FeedTask::default(),
        })
    }
}

impl FeedSource for PullFeed {
    fn mode(&self) -> FeedMode {
        FeedMode::Pull
    }

    fn activate(&mut self, events: UnboundedSender<FeedEvent>) {
        let run = poll_loop(self.client.clone(), self.url.clone(), self.interval, events);
        self.task.start(COMPONENT, run);
    }

    fn teardown(&mut self) {
        self.task.stop(COMPONENT);
    }

    fn is_active(&self) -> bool {
        self.task.is_running()
    }
}

async fn poll_loop(client: Client, url: Url, every: Duration, events: UnboundedSender<FeedEvent>) {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let event = FeedEvent::from(fetch_snapshot(&client, &url).await);
        if events.send(event).is_err() {
            debug!(action = "stop", component = COMPONENT, "Consumer gone, polling stopped");
            return;
        }
    }
}

async fn fetch_snapshot(client: &Client, url: &Url) -> Result<Snapshot, FeedError> {
    let body = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    parse_snapshot(&body)
}
