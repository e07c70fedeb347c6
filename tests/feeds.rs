use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};

use dnsdash::models::dto::EMPTY_TABLE_MESSAGE;
use dnsdash::{
    server, DashboardSession, DashboardState, ErrorReporter, FeedError, FeedEvent, FeedSource, Phase, PullFeed,
    PushFeed, SnapshotReducer,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct CountingReporter {
    reported: Mutex<Vec<FeedError>>,
}

impl CountingReporter {
    fn errors(&self) -> Vec<FeedError> {
        self.reported.lock().unwrap().clone()
    }
}

impl ErrorReporter for CountingReporter {
    fn report(&self, error: &FeedError) {
        self.reported.lock().unwrap().push(error.clone());
    }
}

fn spawn_backend(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<FeedEvent>) -> FeedEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("feed event in time")
        .expect("feed still open")
}

// Third request fails with a 500, every other one returns a snapshot.
async fn flaky_snapshot(State(hits): State<Arc<AtomicUsize>>) -> Response {
    let hit = hits.fetch_add(1, Ordering::SeqCst) + 1;
    if hit == 3 {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let body = format!(r#"[{{"domain":"a.test","count":{}}},{{"domain":"b.test","count":15}}]"#, hit);
    ([("content-type", "application/json")], body).into_response()
}

#[tokio::test]
async fn pull_feed_keeps_its_schedule_after_a_failed_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_backend(
        Router::new()
            .route("/api/suspicious", get(flaky_snapshot))
            .with_state(hits.clone()),
    );

    let feed = PullFeed::new(url(addr, "/api/suspicious"), Duration::from_millis(40), Duration::from_secs(2)).unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let (mut session, _updates) = DashboardSession::new(Box::new(feed), reporter.clone(), 20);

    let mut events = session.activate().expect("feed activates");
    for _ in 0..5 {
        let event = next_event(&mut events).await;
        session.handle_event(event);
    }
    session.teardown();

    assert_eq!(session.state().window().totals(), vec![16, 17, 19, 20]);
    let errors = reporter.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], FeedError::Unreachable(_)));

    // no more requests once torn down
    sleep(Duration::from_millis(120)).await;
    let settled = hits.load(Ordering::SeqCst);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), settled);

    session.teardown();
    assert_eq!(session.state().phase(), Phase::TornDown);
}

#[tokio::test]
async fn pull_feed_reports_malformed_bodies_without_touching_state() {
    let addr = spawn_backend(Router::new().route("/api/suspicious", get(|| async { "{\"oops\": true}" })));

    let feed = PullFeed::new(url(addr, "/api/suspicious"), Duration::from_millis(40), Duration::from_secs(2)).unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let (mut session, _updates) = DashboardSession::new(Box::new(feed), reporter.clone(), 20);

    let mut events = session.activate().expect("feed activates");
    let event = next_event(&mut events).await;
    let before = session.state().clone();
    assert!(!session.handle_event(event));
    session.teardown();

    assert_eq!(before, DashboardState::default());
    assert!(session.state().window().is_empty());
    assert_eq!(reporter.errors().len(), 1);
    assert!(matches!(reporter.errors()[0], FeedError::MalformedPayload(_)));
}

#[tokio::test]
async fn pull_feed_times_out_slow_requests() {
    let addr = spawn_backend(Router::new().route(
        "/api/suspicious",
        get(|| async {
            sleep(Duration::from_secs(2)).await;
            "[]"
        }),
    ));

    let mut feed =
        PullFeed::new(url(addr, "/api/suspicious"), Duration::from_secs(10), Duration::from_millis(100)).unwrap();
    let (tx, mut events) = mpsc::unbounded_channel();
    feed.activate(tx);

    match next_event(&mut events).await {
        FeedEvent::Error(FeedError::Unreachable(detail)) => assert!(detail.contains("timed out"), "{}", detail),
        other => panic!("expected a timeout, got {:?}", other),
    }
    feed.teardown();
}

#[tokio::test]
async fn unreachable_backend_is_reported() {
    // bind then drop to get a port nobody listens on
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let mut feed = PushFeed::new(url(addr, "/api/live"), None).unwrap();
    let (tx, mut events) = mpsc::unbounded_channel();
    feed.activate(tx);

    assert!(matches!(next_event(&mut events).await, FeedEvent::Error(FeedError::Unreachable(_))));
    // without a reconnect policy the feed goes quiet
    assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
    feed.teardown();
    feed.teardown();
    assert!(!feed.is_active());
}

fn live_router(connections: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/api/live",
            get(|State(connections): State<Arc<AtomicUsize>>| async move {
                connections.fetch_add(1, Ordering::SeqCst);
                let messages = vec![
                    Event::default().data(r#"[{"domain":"a.test","count":3},{"domain":"b.test","count":15}]"#),
                    Event::default().data("not json"),
                    Event::default().data("[]"),
                ];
                Sse::new(futures::stream::iter(messages.into_iter().map(Ok::<Event, Infallible>)))
            }),
        )
        .with_state(connections)
}

#[tokio::test]
async fn push_feed_forwards_each_message_and_does_not_reconnect() {
    let connections = Arc::new(AtomicUsize::new(0));
    let addr = spawn_backend(live_router(connections.clone()));

    let feed = PushFeed::new(url(addr, "/api/live"), None).unwrap();
    let reporter = Arc::new(CountingReporter::default());
    let (mut session, _updates) = DashboardSession::new(Box::new(feed), reporter.clone(), 20);

    let mut events = session.activate().expect("feed activates");
    while let Some(event) = timeout(WAIT, events.recv()).await.unwrap() {
        session.handle_event(event);
    }

    let state = session.state();
    assert_eq!(state.phase(), Phase::Active);
    assert_eq!(state.window().totals(), vec![18, 0]);
    assert!(state.latest_snapshot().is_empty());

    let errors = reporter.errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], FeedError::MalformedPayload(_)));
    assert!(matches!(errors[1], FeedError::Unreachable(_)));
    assert_eq!(connections.load(Ordering::SeqCst), 1);

    session.teardown();
    session.teardown();
}

#[tokio::test]
async fn push_feed_reconnects_when_asked_to() {
    let connections = Arc::new(AtomicUsize::new(0));
    let addr = spawn_backend(live_router(connections.clone()));

    let mut feed = PushFeed::new(url(addr, "/api/live"), Some(Duration::from_millis(20))).unwrap();
    let (tx, mut events) = mpsc::unbounded_channel();
    feed.activate(tx);

    let mut snapshots = 0;
    while snapshots < 4 {
        if let FeedEvent::Snapshot(_) = next_event(&mut events).await {
            snapshots += 1;
        }
    }
    feed.teardown();
    assert!(connections.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn repeated_activation_cycles_leave_nothing_running() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_backend(
        Router::new()
            .route("/api/suspicious", get(flaky_snapshot))
            .with_state(hits.clone()),
    );

    let mut feed = PullFeed::new(url(addr, "/api/suspicious"), Duration::from_millis(30), Duration::from_secs(2)).unwrap();
    for _ in 0..3 {
        let (tx, mut events) = mpsc::unbounded_channel();
        feed.activate(tx.clone());
        feed.activate(tx);
        assert!(feed.is_active());
        next_event(&mut events).await;
        feed.teardown();
        feed.teardown();
        assert!(!feed.is_active());
    }

    sleep(Duration::from_millis(120)).await;
    let settled = hits.load(Ordering::SeqCst);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), settled);
}

#[tokio::test]
async fn dashboard_endpoint_serves_the_latest_view() {
    let (publisher, updates) = watch::channel(DashboardState::default());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve_listener(listener, updates, SnapshotReducer::default()));

    let client = reqwest::Client::new();
    let idle: serde_json::Value = client
        .get(url(addr, "/api/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(idle["phase"], "idle");
    assert_eq!(idle["empty_message"], EMPTY_TABLE_MESSAGE);

    let snapshot = dnsdash::feed::parse_snapshot(br#"[{"domain":"a.test","count":3},{"domain":"b.test","count":15}]"#).unwrap();
    publisher.send_replace(DashboardState::default().apply(snapshot, "8:00:00 AM".into(), 20));

    let active: serde_json::Value = client
        .get(url(addr, "/api/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(active["phase"], "active");
    assert_eq!(active["chart"]["data"], serde_json::json!([18]));
    assert_eq!(active["rows"][1]["status"], "Suspicious");
    assert!(active.get("empty_message").is_none());

    let home = client.get(url(addr, "/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(home, "DNS tunnel dashboard running");
}

const BAD_UTF8_PAYLOAD: &[u8] = b"[{\"domain\":\"\xffx.test\",\"count\":1}]";

fn raw_router() -> Router {
    Router::new()
        .route(
            "/api/live",
            get(|| async {
                let mut body = b"data: ".to_vec();
                body.extend_from_slice(BAD_UTF8_PAYLOAD);
                body.extend_from_slice(b"\r\rdata: [{\"domain\":\"cr.test\",\"count\":12}]\r\r");
                ([("content-type", "text/event-stream")], body)
            }),
        )
        .route(
            "/api/suspicious",
            get(|| async { ([("content-type", "application/json")], BAD_UTF8_PAYLOAD.to_vec()) }),
        )
}

#[tokio::test]
async fn push_and_pull_agree_on_invalid_utf8_payloads() {
    let addr = spawn_backend(raw_router());

    let mut push = PushFeed::new(url(addr, "/api/live"), None).unwrap();
    let (tx, mut push_events) = mpsc::unbounded_channel();
    push.activate(tx);

    let mut pull = PullFeed::new(url(addr, "/api/suspicious"), Duration::from_secs(10), Duration::from_secs(2)).unwrap();
    let (tx, mut pull_events) = mpsc::unbounded_channel();
    pull.activate(tx);

    assert!(matches!(
        next_event(&mut push_events).await,
        FeedEvent::Error(FeedError::MalformedPayload(_))
    ));
    assert!(matches!(
        next_event(&mut pull_events).await,
        FeedEvent::Error(FeedError::MalformedPayload(_))
    ));

    // the CR-terminated event after the bad one still arrives
    match next_event(&mut push_events).await {
        FeedEvent::Snapshot(snapshot) => {
            assert_eq!(snapshot.entries()[0].domain, "cr.test");
            assert_eq!(snapshot.entries()[0].count, 12);
        }
        other => panic!("expected a snapshot, got {:?}", other),
    }

    push.teardown();
    pull.teardown();
}

#[tokio::test]
async fn pull_feed_restarts_after_its_consumer_goes_away() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = spawn_backend(
        Router::new()
            .route("/api/suspicious", get(flaky_snapshot))
            .with_state(hits.clone()),
    );

    let feed = PullFeed::new(url(addr, "/api/suspicious"), Duration::from_millis(30), Duration::from_secs(2)).unwrap();
    let (mut session, _updates) = DashboardSession::new(Box::new(feed), Arc::new(CountingReporter::default()), 20);

    let first = session.activate().expect("feed activates");
    assert!(session.activate().is_none());
    drop(first);

    // the feed task ends on its first failed send
    let mut second = None;
    for _ in 0..100 {
        sleep(Duration::from_millis(10)).await;
        second = session.activate();
        if second.is_some() {
            break;
        }
    }
    let mut second = second.expect("feed restarts once the old consumer is gone");

    assert!(matches!(next_event(&mut second).await, FeedEvent::Snapshot(_)));
    session.teardown();
}
