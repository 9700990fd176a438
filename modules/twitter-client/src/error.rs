use thiserror::Error;

pub type Result<T> = std::result::Result<T, TwitterError>;

#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Twitter credentials not configured (set TWITTER_CT0 and TWITTER_AUTH_TOKEN)")]
    MissingCredentials,
}

impl From<reqwest::Error> for TwitterError {
    fn from(err: reqwest::Error) -> Self {
        TwitterError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TwitterError {
    fn from(err: serde_json::Error) -> Self {
        TwitterError::Parse(err.to_string())
    }
}
