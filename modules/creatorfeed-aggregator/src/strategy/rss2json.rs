// rss2json proxy: fetches a located feed through the public JSON conversion
// endpoint. Useful when the feed host blocks direct requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use creatorfeed_common::RawRecord;
use serde::Deserialize;

use super::{FeedLocator, RetrievalStrategy};
use crate::error::{StrategyError, StrategyResult};
use crate::router::Identity;

pub struct Rss2JsonStrategy {
    client: reqwest::Client,
    endpoint: String,
    locator: Arc<dyn FeedLocator>,
    timeout: Duration,
}

impl Rss2JsonStrategy {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        locator: Arc<dyn FeedLocator>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            locator,
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl RetrievalStrategy for Rss2JsonStrategy {
    fn name(&self) -> &str {
        "rss2json"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>> {
        let feed_url = self.locator.feed_url(identity).await?;

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("rss_url", feed_url.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StrategyError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await?;
        let mut records = parse_response(&body)?;
        for record in &mut records {
            record.link = record.link.take().map(|l| self.locator.canonical_link(&l));
        }
        records.truncate(count);
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct Rss2JsonResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    items: Vec<Rss2JsonItem>,
}

#[derive(Debug, Deserialize)]
struct Rss2JsonItem {
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    thumbnail: Option<String>,
    description: Option<String>,
    content: Option<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    link: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn parse_response(body: &[u8]) -> StrategyResult<Vec<RawRecord>> {
    let resp: Rss2JsonResponse = serde_json::from_slice(body)?;
    if resp.status != "ok" {
        return Err(StrategyError::Parse(format!(
            "rss2json status {}: {}",
            resp.status,
            resp.message.unwrap_or_default()
        )));
    }

    Ok(resp.items.into_iter().map(into_record).collect())
}

fn into_record(item: Rss2JsonItem) -> RawRecord {
    let enclosure_image = item
        .enclosure
        .filter(|e| e.kind.as_deref().is_some_and(|k| k.starts_with("image/")))
        .and_then(|e| e.link);

    RawRecord {
        native_id: item.guid,
        title: item.title,
        text: None,
        description: item.description.or(item.content),
        link: item.link,
        published: item.pub_date,
        image_url: enclosure_image,
        thumbnail: item.thumbnail.filter(|t| !t.is_empty()),
        is_reply: None,
        is_retweet: None,
    }
}
