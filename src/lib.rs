pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod models;
pub mod reducer;
pub mod render;
pub mod server;
pub mod session;
pub mod state;
pub mod window;

pub use config::{Args, Config, FeedMode};
pub use error::{ErrorReporter, FeedError, TracingReporter};
pub use feed::{FeedEvent, FeedSource, PullFeed, PushFeed};
pub use reducer::{total_of, SnapshotReducer};
pub use session::DashboardSession;
pub use state::{DashboardState, Phase};
pub use window::TimeSeriesWindow;
