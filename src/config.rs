use clap::{Parser, ValueEnum};
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::FeedError;
use crate::reducer::DEFAULT_SUSPICIOUS_THRESHOLD;
use crate::window::DEFAULT_WINDOW_CAPACITY;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const LIVE_PATH: &str = "/api/live";
pub const SNAPSHOT_PATH: &str = "/api/suspicious";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FeedMode {
    /// Server-sent event stream from the live endpoint
    Push,
    /// Periodic requests to the snapshot endpoint
    Pull,
}

#[derive(Parser, Debug)]
#[command(
    name = "dnsdash",
    about = "Live dashboard for suspicious DNS query activity",
    version,
    long_about = None
)]
pub struct Args {
    /// How snapshots are obtained from the backend
    #[arg(short, long, value_enum, default_value = "push", env = "DNSDASH_FEED_MODE")]
    pub mode: FeedMode,

    /// Backend base URL
    #[arg(short, long, default_value = DEFAULT_BASE_URL, env = "DNSDASH_BASE_URL")]
    pub base_url: String,

    /// Pull mode polling interval
    #[arg(long, default_value_t = 5000, env = "DNSDASH_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Pull mode per-request timeout
    #[arg(long, default_value_t = 4000, env = "DNSDASH_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Number of samples kept for the activity chart
    #[arg(short, long, default_value_t = DEFAULT_WINDOW_CAPACITY, env = "DNSDASH_WINDOW_CAPACITY")]
    pub window_capacity: usize,

    /// Query count above which a domain is flagged suspicious
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_SUSPICIOUS_THRESHOLD as i64,
        allow_negative_numbers = true,
        env = "DNSDASH_THRESHOLD"
    )]
    pub threshold: i64,

    /// Reopen the live stream this long after it fails (push mode only)
    #[arg(long, env = "DNSDASH_RECONNECT_MS")]
    pub reconnect_ms: Option<u64>,

    /// Serve the dashboard view as JSON on this address
    #[arg(long, env = "DNSDASH_SERVE")]
    pub serve: Option<SocketAddr>,

    /// Do not print the dashboard to the terminal
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub feed_mode: FeedMode,
    pub base_url: Url,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub window_capacity: usize,
    pub suspicious_threshold: u64,
    pub reconnect_after: Option<Duration>,
    pub serve_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            feed_mode: FeedMode::Push,
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            poll_interval: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(4000),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            suspicious_threshold: DEFAULT_SUSPICIOUS_THRESHOLD,
            reconnect_after: None,
            serve_addr: None,
        }
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, FeedError> {
        if args.window_capacity == 0 {
            return Err(FeedError::Unsupported("window capacity must be at least 1".into()));
        }
        if args.threshold < 0 {
            return Err(FeedError::Unsupported(format!(
                "suspicious threshold must be non-negative, got {}",
                args.threshold
            )));
        }
        if args.poll_interval_ms == 0 {
            return Err(FeedError::Unsupported("poll interval must be greater than 0".into()));
        }
        if args.request_timeout_ms == 0 {
            return Err(FeedError::Unsupported("request timeout must be greater than 0".into()));
        }
        if args.reconnect_ms == Some(0) {
            return Err(FeedError::Unsupported("reconnect delay must be greater than 0".into()));
        }

        let base_url = Url::parse(&args.base_url)
            .map_err(|e| FeedError::Unsupported(format!("invalid base url '{}': {}", args.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FeedError::Unsupported(format!("base url '{}' cannot carry a path", args.base_url)));
        }

        Ok(Config {
            feed_mode: args.mode,
            base_url,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            window_capacity: args.window_capacity,
            suspicious_threshold: args.threshold as u64,
            reconnect_after: args.reconnect_ms.map(Duration::from_millis),
            serve_addr: args.serve,
        })
    }

    pub fn live_url(&self) -> Url {
        self.endpoint(LIVE_PATH)
    }

    pub fn snapshot_url(&self) -> Url {
        self.endpoint(SNAPSHOT_PATH)
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }
}
