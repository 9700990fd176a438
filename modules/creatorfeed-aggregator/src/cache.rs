use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creatorfeed_common::{Platform, RawRecord};
use tokio::sync::RwLock;

use crate::router::Identity;

/// Cache key: one entry per (platform, canonical identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub platform: Platform,
    pub identity: String,
}

impl CacheKey {
    pub fn new(platform: Platform, identity: &Identity) -> Self {
        Self {
            platform,
            identity: identity.key(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.platform, self.identity)
    }
}

/// Last successful retrieval for one identity.
///
/// `captured_count` is how many records the capture can answer for. It can
/// exceed `records.len()` when the upstream had fewer posts than were asked for.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub records: Vec<RawRecord>,
    pub captured_at: DateTime<Utc>,
    captured_count: usize,
}

impl CacheEntry {
    pub fn new(records: Vec<RawRecord>, captured_at: DateTime<Utc>) -> Self {
        let captured_count = records.len();
        Self {
            records,
            captured_at,
            captured_count,
        }
    }

    /// Mark the entry as the complete answer to a request for `requested`
    /// records, even if fewer came back.
    pub fn answering(mut self, requested: usize) -> Self {
        self.captured_count = self.captured_count.max(requested);
        self
    }

    pub fn captured_count(&self) -> usize {
        self.captured_count
    }

    /// Fresh (younger than `ttl`) and captured for at least `requested` records.
    pub fn is_usable(&self, now: DateTime<Utc>, ttl: Duration, requested: usize) -> bool {
        let age = now.signed_duration_since(self.captured_at);
        let fresh = chrono::Duration::from_std(ttl)
            .map(|ttl| age < ttl)
            .unwrap_or(true);
        fresh && self.captured_count >= requested
    }
}

/// Shared store of recent retrievals, keyed per identity.
#[async_trait]
pub trait FreshnessCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Replace the entry for `key` wholesale.
    async fn set(&self, key: CacheKey, entry: CacheEntry);

    async fn invalidate(&self, key: &CacheKey);
}

/// In-process cache. Entries live until replaced or invalidated; staleness is
/// judged by the reader.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl FreshnessCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.write().await.insert(key, entry);
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }
}
