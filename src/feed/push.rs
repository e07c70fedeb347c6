use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time;
use tracing::{debug, info};

use super::{http_client, parse_snapshot, FeedEvent, FeedSource, FeedTask, SseDecoder};
use crate::config::FeedMode;
use crate::error::FeedError;

const COMPONENT: &str = "push_feed";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-lived server-sent event stream from the live endpoint.
///
/// Without a reconnect delay the feed reports the first transport failure and
/// goes quiet until it is activated again.
pub struct PushFeed {
    client: Client,
    url: Url,
    reconnect_after: Option<Duration>,
    task: FeedTask,
}

impl PushFeed {
    pub fn new(url: Url, reconnect_after: Option<Duration>) -> Result<Self, FeedError> {
        Ok(PushFeed {
            client: http_client(Client::builder().connect_timeout(CONNECT_TIMEOUT))?,
            url,
            reconnect_after,
            task: FeedTask::default(),
        })
    }
}

impl FeedSource for PushFeed {
    fn mode(&self) -> FeedMode {
        FeedMode::Push
    }

    fn activate(&mut self, events: UnboundedSender<FeedEvent>) {
        let run = stream_loop(self.client.clone(), self.url.clone(), self.reconnect_after, events);
        self.task.start(COMPONENT, run);
    }

    fn teardown(&mut self) {
        self.task.stop(COMPONENT);
    }

    fn is_active(&self) -> bool {
        self.task.is_running()
    }
}

async fn stream_loop(
    client: Client,
    url: Url,
    reconnect_after: Option<Duration>,
    events: UnboundedSender<FeedEvent>,
) {
    loop {
        let error = match stream_once(&client, &url, &events).await {
            Ok(()) => return,
            Err(error) => error,
        };
        if events.send(FeedEvent::Error(error)).is_err() {
            return;
        }

        match reconnect_after {
            Some(delay) => {
                info!(action = "reconnect", component = COMPONENT, delay_ms = delay.as_millis() as u64, "Reopening live stream");
                time::sleep(delay).await;
            }
            None => return,
        }
    }
}

/// Streams one connection. `Ok` means the consumer is gone; every way the
/// connection itself can end is an error.
async fn stream_once(client: &Client, url: &Url, events: &UnboundedSender<FeedEvent>) -> Result<(), FeedError> {
    let response = client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?;
    debug!(action = "connect", component = COMPONENT, url = %url, "Live stream open");

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    while let Some(chunk) = body.next().await {
        for message in decoder.feed(&chunk?) {
            let event = FeedEvent::from(message.and_then(|data| parse_snapshot(&data)));
            if events.send(event).is_err() {
                return Ok(());
            }
        }
    }

    Err(FeedError::Unreachable("live stream closed by server".into()))
}
