// RSS/Atom retrieval. A locator turns an identity into a feed URL; the feed
// strategy fetches it directly or through a read-only mirror and parses it
// with feed-rs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use creatorfeed_common::RawRecord;
use url::Url;

use super::{get_body, RetrievalStrategy};
use crate::error::{StrategyError, StrategyResult};
use crate::router::{Identity, IdentityKind};

/// Maps an identity to the RSS/Atom feed that lists its recent posts.
#[async_trait]
pub trait FeedLocator: Send + Sync {
    async fn feed_url(&self, identity: &Identity) -> StrategyResult<String>;

    /// Rewrite a permalink found in the feed to its canonical form.
    fn canonical_link(&self, link: &str) -> String {
        link.to_string()
    }
}

/// `<instance>/<user>/rss` on a Nitter-compatible mirror.
pub struct NitterLocator {
    instance: String,
}

impl NitterLocator {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn host(&self) -> &str {
        self.instance
            .split("://")
            .nth(1)
            .unwrap_or(&self.instance)
    }
}

#[async_trait]
impl FeedLocator for NitterLocator {
    async fn feed_url(&self, identity: &Identity) -> StrategyResult<String> {
        match identity.kind {
            IdentityKind::Username => Ok(format!("{}/{}/rss", self.instance, identity.value)),
            _ => Err(StrategyError::Unresolved(identity.to_string())),
        }
    }

    /// Mirror permalinks point back at x.com, without the `#m` anchor.
    fn canonical_link(&self, link: &str) -> String {
        let Ok(mut url) = Url::parse(link) else {
            return link.to_string();
        };
        url.set_fragment(None);
        if url.set_host(Some("x.com")).is_err() {
            return link.to_string();
        }
        let _ = url.set_scheme("https");
        let _ = url.set_port(None);
        url.to_string()
    }
}

/// Fetches a located feed, optionally through a mirror prefix
/// (`<mirror><percent-encoded feed URL>`).
pub struct FeedStrategy {
    name: String,
    client: reqwest::Client,
    locator: Arc<dyn FeedLocator>,
    mirror: Option<String>,
    timeout: Duration,
}

impl FeedStrategy {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        locator: Arc<dyn FeedLocator>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            locator,
            mirror: None,
            timeout,
        }
    }

    pub fn through_mirror(mut self, prefix: impl Into<String>) -> Self {
        self.mirror = Some(prefix.into());
        self
    }
}

#[async_trait]
impl RetrievalStrategy for FeedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>> {
        let feed_url = self.locator.feed_url(identity).await?;
        let url = match &self.mirror {
            Some(prefix) => mirrored(prefix, &feed_url),
            None => feed_url,
        };

        let body = get_body(&self.client, &url).await?;
        let mut records = parse_feed(&body)?;
        for record in &mut records {
            record.link = record.link.take().map(|l| self.locator.canonical_link(&l));
        }
        records.truncate(count);
        Ok(records)
    }
}

pub(crate) fn mirrored(prefix: &str, target: &str) -> String {
    format!("{prefix}{}", urlencoding::encode(target))
}

/// Parse an RSS/Atom body into raw records, in feed order.
pub fn parse_feed(body: &[u8]) -> StrategyResult<Vec<RawRecord>> {
    let feed = feed_rs::parser::parse(body)?;

    let records = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));

            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339());

            let media_description = entry
                .media
                .iter()
                .find_map(|m| m.description.as_ref().map(|d| d.content.clone()));
            let thumbnail = entry
                .media
                .iter()
                .flat_map(|m| m.thumbnails.iter())
                .map(|t| t.image.uri.clone())
                .next();

            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .or(media_description);

            RawRecord {
                native_id: (!entry.id.is_empty()).then_some(entry.id),
                title: entry.title.map(|t| t.content),
                text: None,
                description,
                link,
                published,
                image_url: None,
                thumbnail,
                is_reply: None,
                is_retweet: None,
            }
        })
        .collect();

    Ok(records)
}
