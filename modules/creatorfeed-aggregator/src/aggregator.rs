use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use creatorfeed_common::{Config, FeedError, FeedItem, FeedSettings, Platform, RawRecord, Source};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use twitter_client::TwitterClient;

use crate::cache::{CacheKey, FreshnessCache, MemoryCache};
use crate::filter::{self, RecencyFilter};
use crate::normalize::{normalize, NormalizeContext};
use crate::router::{self, Identity};
use crate::select::select_balanced;
use crate::strategy::{
    ChannelResolver, FeedLocator, FeedStrategy, Freshness, NitterLocator, Rss2JsonStrategy,
    StrategyChain, TwitterGraphQlStrategy, VideosPageStrategy, YouTubeLocator, USER_AGENT,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub force_refresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidUrl,
    /// Platform has no retrieval chain.
    Unsupported,
    /// Every strategy failed, or nothing survived filtering.
    NoContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSource {
    pub source_id: String,
    pub reason: SkipReason,
    pub detail: String,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub items: Vec<FeedItem>,
    pub sources_total: usize,
    pub sources_with_items: usize,
    pub skipped: Vec<SkippedSource>,
}

/// Sources that share a cache key, fetched once per pass.
struct FetchGroup {
    platform: Platform,
    identity: Identity,
    members: Vec<usize>,
}

/// Fans out retrieval across sources and merges the results.
pub struct Aggregator {
    chains: HashMap<Platform, StrategyChain>,
    cache: Arc<dyn FreshnessCache>,
    settings: FeedSettings,
}

impl Aggregator {
    /// An aggregator with no retrieval chains. Add them with [`with_chain`].
    ///
    /// [`with_chain`]: Aggregator::with_chain
    pub fn new(settings: FeedSettings, cache: Arc<dyn FreshnessCache>) -> Self {
        Self {
            chains: HashMap::new(),
            cache,
            settings,
        }
    }

    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chains.insert(chain.platform(), chain);
        self
    }

    /// Wire the standard chains from env config and settings.
    pub fn from_config(
        config: &Config,
        settings: FeedSettings,
        cache: Arc<dyn FreshnessCache>,
    ) -> Result<Self, FeedError> {
        settings.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        let ttl = Duration::from_secs(settings.cache_ttl_secs);

        let twitter = twitter_chain(config, &http, ttl)?;
        let youtube = youtube_chain(config, &settings, &http, ttl);

        info!(
            twitter = ?twitter.strategy_names(),
            youtube = ?youtube.strategy_names(),
            "aggregator: strategy chains configured"
        );

        Ok(Self::new(settings, cache).with_chain(twitter).with_chain(youtube))
    }

    /// Same as [`from_config`](Aggregator::from_config) with an in-process cache.
    pub fn from_config_in_memory(
        config: &Config,
        settings: FeedSettings,
    ) -> Result<Self, FeedError> {
        Self::from_config(config, settings, Arc::new(MemoryCache::new()))
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Fetch every source concurrently and merge into one ordered list.
    ///
    /// Per-source failures are isolated and reported in
    /// [`FeedSnapshot::skipped`]. Returns [`FeedError::NothingFetched`] when
    /// there were sources but none produced an item.
    pub async fn aggregate(
        &self,
        sources: &[Source],
        options: AggregateOptions,
    ) -> Result<FeedSnapshot, FeedError> {
        let now = Utc::now();
        let freshness = if options.force_refresh {
            Freshness::ForceRefresh
        } else {
            Freshness::UseCache
        };
        info!(sources = sources.len(), refresh = options.force_refresh, "aggregate: starting");

        let mut skipped = Vec::new();
        let mut groups: Vec<FetchGroup> = Vec::new();
        let mut group_index: HashMap<CacheKey, usize> = HashMap::new();

        for (i, source) in sources.iter().enumerate() {
            let resolved = match router::resolve(&source.url) {
                Ok(r) => r,
                Err(e) => {
                    warn!(source_id = %source.id, error = %e, "aggregate: skipping source");
                    skipped.push(SkippedSource {
                        source_id: source.id.clone(),
                        reason: SkipReason::InvalidUrl,
                        detail: e.to_string(),
                    });
                    continue;
                }
            };
            if resolved.platform != source.platform {
                debug!(
                    source_id = %source.id,
                    tagged = %source.platform,
                    detected = %resolved.platform,
                    "aggregate: platform tag differs from URL"
                );
            }
            if !self.chains.contains_key(&resolved.platform) {
                warn!(
                    source_id = %source.id,
                    platform = %resolved.platform,
                    "aggregate: no retrieval chain"
                );
                skipped.push(SkippedSource {
                    source_id: source.id.clone(),
                    reason: SkipReason::Unsupported,
                    detail: format!("{} sources are not supported", resolved.platform.label()),
                });
                continue;
            }

            let key = CacheKey::new(resolved.platform, &resolved.identity);
            let slot = *group_index.entry(key).or_insert_with(|| {
                groups.push(FetchGroup {
                    platform: resolved.platform,
                    identity: resolved.identity.clone(),
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].members.push(i);
        }

        let fetch_count = self.settings.fetch_count;
        let fetches = groups.iter().map(|group| async move {
            match self.chains.get(&group.platform) {
                Some(chain) => {
                    chain
                        .fetch(self.cache.as_ref(), &group.identity, fetch_count, freshness)
                        .await
                }
                None => Vec::new(),
            }
        });
        let fetched = join_all(fetches).await;

        let mut per_source: Vec<(usize, Vec<FeedItem>)> = Vec::new();
        for (group, records) in groups.iter().zip(fetched) {
            for &i in &group.members {
                let source = &sources[i];
                let items = self.source_items(source, group, &records, now);
                if items.is_empty() {
                    info!(
                        source_id = %source.id,
                        identity = %group.identity,
                        "aggregate: no content"
                    );
                    skipped.push(SkippedSource {
                        source_id: source.id.clone(),
                        reason: SkipReason::NoContent,
                        detail: format!("nothing recent for {}", group.identity),
                    });
                } else {
                    per_source.push((i, items));
                }
            }
        }
        per_source.sort_by_key(|(i, _)| *i);

        let sources_with_items = per_source.len();
        let mut seen = HashSet::new();
        let mut merged: Vec<(bool, FeedItem)> = Vec::new();
        for (i, items) in per_source {
            let pinned = sources[i].pinned;
            for item in items {
                if item.is_valid() && seen.insert(item.id.clone()) {
                    merged.push((pinned, item));
                }
            }
        }
        merged.sort_by(|(pa, a), (pb, b)| {
            pb.cmp(pa)
                .then_with(|| filter::sort_key(b).cmp(&filter::sort_key(a)))
                .then_with(|| a.id.cmp(&b.id))
        });
        let items: Vec<FeedItem> = merged.into_iter().map(|(_, item)| item).collect();

        info!(
            fetched = sources_with_items,
            total = sources.len(),
            items = items.len(),
            "aggregate: Successfully fetched {}/{} sources",
            sources_with_items,
            sources.len()
        );

        if items.is_empty() && !sources.is_empty() {
            return Err(FeedError::NothingFetched {
                sources: sources.len(),
            });
        }

        Ok(FeedSnapshot {
            items,
            sources_total: sources.len(),
            sources_with_items,
            skipped,
        })
    }

    /// Preview the newest item of a single source. Invalid URLs are errors;
    /// a source with no content is `Ok(None)`.
    pub async fn aggregate_one(&self, source: &Source) -> Result<Option<FeedItem>, FeedError> {
        router::resolve(&source.url)?;
        match self
            .aggregate(std::slice::from_ref(source), AggregateOptions::default())
            .await
        {
            Ok(snapshot) => Ok(snapshot.items.into_iter().next()),
            Err(FeedError::NothingFetched { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Normalize, filter and select one source's share of its group's records.
    fn source_items(
        &self,
        source: &Source,
        group: &FetchGroup,
        records: &[RawRecord],
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        let ctx = NormalizeContext {
            platform: group.platform,
            source_id: &source.id,
            identity: &group.identity,
            captured_at: now,
        };
        let normalized: Vec<FeedItem> = records
            .iter()
            .enumerate()
            .map(|(index, record)| normalize(record, index, &ctx))
            .filter(FeedItem::is_valid)
            .collect();

        let recency = RecencyFilter::new(self.settings.window_days, self.settings.exclude_shorts);
        let candidates = recency.apply(normalized, group.platform.kind(), now);

        select_balanced(
            candidates,
            self.settings.items_per_source,
            self.settings.max_secondary_per_source,
        )
    }
}

fn twitter_chain(
    config: &Config,
    http: &reqwest::Client,
    ttl: Duration,
) -> Result<StrategyChain, FeedError> {
    let mut chain = StrategyChain::new(Platform::Twitter, ttl);

    match config.twitter_session() {
        Some((ct0, auth_token)) => {
            let mut client = TwitterClient::new(ct0.to_string(), auth_token.to_string())
                .context("Failed to build X client")?;
            if let Some(token) = &config.twitter_bearer_token {
                client = client.with_bearer_token(token.clone());
            }
            chain.push(Arc::new(TwitterGraphQlStrategy::new(client)));
        }
        None => info!("aggregator: X session not configured, skipping x-graphql"),
    }

    for instance in &config.nitter_instances {
        let locator = NitterLocator::new(instance.as_str());
        let name = format!("nitter({})", locator.host());
        chain.push(Arc::new(FeedStrategy::new(
            name,
            http.clone(),
            Arc::new(locator),
            Duration::from_secs(8),
        )));
    }

    if let Some(first) = config.nitter_instances.first() {
        chain.push(Arc::new(Rss2JsonStrategy::new(
            http.clone(),
            config.rss2json_endpoint.as_str(),
            Arc::new(NitterLocator::new(first.as_str())),
        )));
    }

    Ok(chain)
}

fn youtube_chain(
    config: &Config,
    settings: &FeedSettings,
    http: &reqwest::Client,
    ttl: Duration,
) -> StrategyChain {
    let resolver = Arc::new(ChannelResolver::new(
        http.clone(),
        config.feed_mirrors.clone(),
        &settings.known_channels,
    ));
    let locator: Arc<dyn FeedLocator> = Arc::new(YouTubeLocator::new(resolver.clone()));

    let mut chain = StrategyChain::new(Platform::YouTube, ttl);
    chain.push(Arc::new(FeedStrategy::new(
        "youtube-feed",
        http.clone(),
        locator.clone(),
        Duration::from_secs(10),
    )));
    chain.push(Arc::new(Rss2JsonStrategy::new(
        http.clone(),
        config.rss2json_endpoint.as_str(),
        locator.clone(),
    )));
    for mirror in &config.feed_mirrors {
        let name = format!("mirror({})", mirror_host(mirror));
        chain.push(Arc::new(
            FeedStrategy::new(name, http.clone(), locator.clone(), Duration::from_secs(8))
                .through_mirror(mirror.as_str()),
        ));
    }
    chain.push(Arc::new(VideosPageStrategy::new(http.clone(), resolver)));
    chain
}

fn mirror_host(prefix: &str) -> String {
    url::Url::parse(prefix)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| prefix.to_string())
}
