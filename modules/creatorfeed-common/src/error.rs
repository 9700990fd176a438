use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedError>;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Bad input URL. Surfaced immediately and never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Every source was processed and none produced an item.
    #[error("No items could be fetched from {sources} source(s)")]
    NothingFetched { sources: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FeedError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FeedError::Validation(_))
    }
}
