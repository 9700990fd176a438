use std::time::Duration;

use twitter_client::TwitterError;

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;

/// Failure of a single retrieval strategy. Always recovered by advancing the
/// chain; never surfaced to callers of the aggregator.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned status {status}")]
    Status { status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The identity could not be turned into something this strategy can query.
    #[error("Unresolved identity: {0}")]
    Unresolved(String),

    #[error("Client error: {0}")]
    Client(#[from] TwitterError),
}

impl From<reqwest::Error> for StrategyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StrategyError::Status {
                status: status.as_u16(),
            },
            None => StrategyError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StrategyError {
    fn from(err: serde_json::Error) -> Self {
        StrategyError::Parse(err.to_string())
    }
}

impl From<feed_rs::parser::ParseFeedError> for StrategyError {
    fn from(err: feed_rs::parser::ParseFeedError) -> Self {
        StrategyError::Parse(err.to_string())
    }
}
