use thiserror::Error;
use tracing::warn;

pub const ERROR_MALFORMED_PAYLOAD: &str = "FE-MALFORMED-PAYLOAD";
pub const ERROR_UNREACHABLE: &str = "FE-UNREACHABLE";
pub const ERROR_UNSUPPORTED: &str = "FE-UNSUPPORTED";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("malformed feed payload: {0}")]
    MalformedPayload(String),
    #[error("feed unreachable: {0}")]
    Unreachable(String),
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
}

impl FeedError {
    pub fn stable_code(&self) -> &'static str {
        match self {
            Self::MalformedPayload(_) => ERROR_MALFORMED_PAYLOAD,
            Self::Unreachable(_) => ERROR_UNREACHABLE,
            Self::Unsupported(_) => ERROR_UNSUPPORTED,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FeedError::Unreachable(format!("request timed out: {}", error))
        } else {
            FeedError::Unreachable(error.to_string())
        }
    }
}

/// Receives every feed error the session drops.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &FeedError);
}

/// Default reporter: one `warn` line per error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, error: &FeedError) {
        warn!(
            action = "report",
            component = "feed",
            code = error.stable_code(),
            error = %error,
            "Feed event dropped"
        );
    }
}
