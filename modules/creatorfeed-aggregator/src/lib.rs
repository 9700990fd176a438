pub mod aggregator;
pub mod cache;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod router;
pub mod select;
pub mod strategy;
pub mod text_extract;

pub use aggregator::{AggregateOptions, Aggregator, FeedSnapshot, SkipReason, SkippedSource};
pub use cache::{CacheEntry, CacheKey, FreshnessCache, MemoryCache};
pub use error::{StrategyError, StrategyResult};
pub use router::{resolve, Identity, IdentityKind, ResolvedSource};
pub use strategy::{Freshness, RetrievalStrategy, StrategyChain};
