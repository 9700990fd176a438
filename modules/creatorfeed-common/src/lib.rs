pub mod config;
pub mod error;
pub mod types;

pub use config::{load_settings, Config, FeedSettings};
pub use error::{FeedError, Result};
pub use types::*;
