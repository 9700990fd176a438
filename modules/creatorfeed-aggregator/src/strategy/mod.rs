// Retrieval strategies and the per-platform fallback chain.
//
// A chain consults the freshness cache, then tries each strategy in priority
// order under its own timeout, stopping at the first non-empty result.

pub mod feed;
pub mod rss2json;
pub mod twitter_graphql;
pub mod youtube;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use creatorfeed_common::{Platform, RawRecord};
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, FreshnessCache};
use crate::error::{StrategyError, StrategyResult};
use crate::router::Identity;

pub use feed::{FeedLocator, FeedStrategy, NitterLocator};
pub use rss2json::Rss2JsonStrategy;
pub use twitter_graphql::TwitterGraphQlStrategy;
pub use youtube::{ChannelResolver, VideosPageStrategy, YouTubeLocator};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; creatorfeed/0.1)";

/// One way of retrieving recent records for an identity.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Upper bound on one `fetch` call. Enforced by the chain.
    fn timeout(&self) -> Duration;

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>>;
}

/// Whether a chain may answer from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    UseCache,
    ForceRefresh,
}

/// Ordered fallback strategies for one platform.
pub struct StrategyChain {
    platform: Platform,
    strategies: Vec<Arc<dyn RetrievalStrategy>>,
    ttl: Duration,
}

impl StrategyChain {
    pub fn new(platform: Platform, ttl: Duration) -> Self {
        Self {
            platform,
            strategies: Vec::new(),
            ttl,
        }
    }

    pub fn with_strategy(mut self, strategy: impl RetrievalStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn push(&mut self, strategy: Arc<dyn RetrievalStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Records for `identity`, at most `count`. Empty when every strategy
    /// fails; strategy errors never escape.
    pub async fn fetch(
        &self,
        cache: &dyn FreshnessCache,
        identity: &Identity,
        count: usize,
        freshness: Freshness,
    ) -> Vec<RawRecord> {
        let key = CacheKey::new(self.platform, identity);

        match freshness {
            Freshness::UseCache => {
                if let Some(entry) = cache.get(&key).await {
                    if entry.is_usable(Utc::now(), self.ttl, count) {
                        debug!(key = %key, cached = entry.captured_count(), "chain: cache hit");
                        let mut records = entry.records;
                        records.truncate(count);
                        return records;
                    }
                    debug!(
                        key = %key,
                        have = entry.captured_count(),
                        need = count,
                        "chain: cache stale or insufficient"
                    );
                }
            }
            Freshness::ForceRefresh => {
                debug!(key = %key, "chain: refresh requested, invalidating");
                cache.invalidate(&key).await;
            }
        }

        for strategy in &self.strategies {
            match self.attempt(strategy.as_ref(), identity, count).await {
                Ok(mut records) if !records.is_empty() => {
                    records.truncate(count);
                    info!(
                        key = %key,
                        strategy = strategy.name(),
                        count = records.len(),
                        "chain: fetched"
                    );
                    // A short answer to a request for `count` is the whole upstream feed.
                    let entry = CacheEntry::new(records.clone(), Utc::now()).answering(count);
                    cache.set(key, entry).await;
                    return records;
                }
                Ok(_) => {
                    warn!(
                        key = %key,
                        strategy = strategy.name(),
                        "chain: strategy returned nothing"
                    );
                }
                Err(e) => {
                    warn!(
                        key = %key,
                        strategy = strategy.name(),
                        error = %e,
                        "chain: strategy failed"
                    );
                }
            }
        }

        warn!(key = %key, strategies = self.strategies.len(), "chain: all strategies exhausted");
        Vec::new()
    }

    async fn attempt(
        &self,
        strategy: &dyn RetrievalStrategy,
        identity: &Identity,
        count: usize,
    ) -> StrategyResult<Vec<RawRecord>> {
        let limit = strategy.timeout();
        debug!(strategy = strategy.name(), %identity, "chain: trying strategy");
        tokio::time::timeout(limit, strategy.fetch(identity, count))
            .await
            .map_err(|_| StrategyError::Timeout(limit))?
    }
}

/// GET a URL and return the body, treating non-2xx as a failure.
pub(crate) async fn get_body(client: &reqwest::Client, url: &str) -> StrategyResult<Vec<u8>> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(StrategyError::Status {
            status: status.as_u16(),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
