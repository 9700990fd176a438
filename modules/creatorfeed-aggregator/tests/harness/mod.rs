//! Test harness for aggregation tests.
//!
//! Fakes the upstream strategies with scripted responses and wraps the
//! in-memory cache to count traffic. No network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creatorfeed_aggregator::{
    Aggregator, CacheEntry, CacheKey, FreshnessCache, Identity, MemoryCache, RetrievalStrategy,
    StrategyChain, StrategyError, StrategyResult,
};
use creatorfeed_common::{FeedSettings, Platform, RawRecord};

// ---------------------------------------------------------------------------
// Scripted strategy
// ---------------------------------------------------------------------------

/// Strategy that answers from a per-identity script.
///
/// Unknown identities fail, like an upstream that cannot find the user.
#[derive(Default)]
pub struct MockStrategy {
    name: String,
    responses: HashMap<String, Vec<RawRecord>>,
    failing: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockStrategy {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Records served for the identity whose value is `value`
    /// (case-insensitive, like the handles themselves).
    pub fn on(mut self, value: &str, records: Vec<RawRecord>) -> Self {
        self.responses.insert(value.to_lowercase(), records);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(100)
    }

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(StrategyError::Status { status: 503 });
        }
        match self.responses.get(&identity.value.to_lowercase()) {
            Some(records) => Ok(records.iter().take(count).cloned().collect()),
            None => Err(StrategyError::Unresolved(identity.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Counting cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingCache {
    inner: MemoryCache,
    pub sets: AtomicUsize,
    pub invalidations: AtomicUsize,
}

#[async_trait]
impl FreshnessCache for CountingCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.get(key).await
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, entry).await;
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(key).await;
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn ttl() -> Duration {
    Duration::from_secs(1800)
}

fn chain(platform: Platform, strategies: &[&Arc<MockStrategy>]) -> StrategyChain {
    let mut chain = StrategyChain::new(platform, ttl());
    for s in strategies {
        chain.push(Arc::clone(*s) as Arc<dyn RetrievalStrategy>);
    }
    chain
}

pub fn twitter_chain(strategies: &[&Arc<MockStrategy>]) -> StrategyChain {
    chain(Platform::Twitter, strategies)
}

pub fn youtube_chain(strategies: &[&Arc<MockStrategy>]) -> StrategyChain {
    chain(Platform::YouTube, strategies)
}

pub fn aggregator(cache: Arc<CountingCache>, chains: Vec<StrategyChain>) -> Aggregator {
    aggregator_with(FeedSettings::default(), cache, chains)
}

pub fn aggregator_with(
    settings: FeedSettings,
    cache: Arc<CountingCache>,
    chains: Vec<StrategyChain>,
) -> Aggregator {
    chains
        .into_iter()
        .fold(Aggregator::new(settings, cache), |agg, chain| agg.with_chain(chain))
}

/// A tweet by `user` with a status permalink.
pub fn tweet(user: &str, id: &str, text: &str, published: DateTime<Utc>) -> RawRecord {
    RawRecord {
        native_id: Some(id.to_string()),
        text: Some(text.to_string()),
        link: Some(format!("https://x.com/{user}/status/{id}")),
        published: Some(published.to_rfc3339()),
        is_reply: Some(false),
        is_retweet: Some(false),
        ..Default::default()
    }
}

pub fn reply(user: &str, id: &str, text: &str, published: DateTime<Utc>) -> RawRecord {
    RawRecord {
        is_reply: Some(true),
        ..tweet(user, id, text, published)
    }
}

/// A tweet whose upstream gave no timestamp.
pub fn undated(user: &str, id: &str, text: &str) -> RawRecord {
    RawRecord {
        published: None,
        ..tweet(user, id, text, Utc::now())
    }
}

pub fn video(id: &str, title: &str, published: Option<DateTime<Utc>>) -> RawRecord {
    RawRecord {
        native_id: Some(format!("yt:video:{id}")),
        title: Some(title.to_string()),
        link: Some(format!("https://www.youtube.com/watch?v={id}")),
        published: published.map(|p| p.to_rfc3339()),
        ..Default::default()
    }
}
