// YouTube: channel id resolution, the official feed locator, and a degraded
// scrape of the channel's videos page.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use creatorfeed_common::RawRecord;
use regex::Regex;
use tracing::{debug, info, warn};

use super::feed::mirrored;
use super::{get_body, FeedLocator, RetrievalStrategy};
use crate::error::{StrategyError, StrategyResult};
use crate::router::{Identity, IdentityKind};

const FEED_BASE: &str = "https://www.youtube.com/feeds/videos.xml?channel_id=";

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link rel="canonical" href="https://www\.youtube\.com/channel/([^"]+)""#)
        .expect("valid regex")
});
static CHANNEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""channelId":"([^"]+)""#).expect("valid regex"));
static BROWSE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""browseId":"(UC[^"]+)""#).expect("valid regex"));
static RENDERER_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\{"videoId":"([a-zA-Z0-9_-]{11})""#).expect("valid regex"));
static RENDERER_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""title":\{"runs":\[\{"text":"((?:[^"\\]|\\.)*)""#).expect("valid regex")
});
static PUBLISHED_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""publishedTimeText":\{"simpleText":"([^"]*)""#).expect("valid regex")
});
static BARE_VIDEO_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""videoId":"([a-zA-Z0-9_-]{11})""#).expect("valid regex"));
static AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago").expect("valid regex")
});

/// Maps handles and legacy names to `UC…` channel ids.
///
/// Lookup order: the identity itself, the configured table, the memo, then a
/// scrape of the channel page (directly, then through each mirror).
pub struct ChannelResolver {
    client: reqwest::Client,
    mirrors: Vec<String>,
    known: HashMap<String, String>,
    memo: Mutex<HashMap<String, String>>,
}

impl ChannelResolver {
    pub fn new(
        client: reqwest::Client,
        mirrors: Vec<String>,
        known_channels: &HashMap<String, String>,
    ) -> Self {
        let known = known_channels
            .iter()
            .map(|(handle, id)| (handle.trim_start_matches('@').to_lowercase(), id.clone()))
            .collect();
        Self {
            client,
            mirrors,
            known,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, identity: &Identity) -> StrategyResult<String> {
        if identity.kind == IdentityKind::ChannelId {
            return Ok(identity.value.clone());
        }
        let key = identity.value.to_lowercase();
        if let Some(id) = self.known.get(&key) {
            return Ok(id.clone());
        }
        if let Some(id) = self.memo.lock().ok().and_then(|m| m.get(&key).cloned()) {
            return Ok(id);
        }

        let page = channel_page_url(identity)
            .ok_or_else(|| StrategyError::Unresolved(identity.to_string()))?;
        let html = self.fetch_page(&page).await?;
        let id = extract_channel_id(&html)
            .ok_or_else(|| StrategyError::Unresolved(format!("no channel id on {page}")))?;

        info!(%identity, channel_id = %id, "youtube: resolved channel id");
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, id.clone());
        }
        Ok(id)
    }

    /// Channel page body, direct first, then through mirrors.
    async fn fetch_page(&self, url: &str) -> StrategyResult<String> {
        let mut last_err = StrategyError::Unresolved(url.to_string());
        let attempts = std::iter::once(url.to_string())
            .chain(self.mirrors.iter().map(|m| mirrored(m, url)));

        for attempt in attempts {
            match get_body(&self.client, &attempt).await {
                Ok(body) => {
                    let html = String::from_utf8_lossy(&body).into_owned();
                    if html.contains("youtube.com") {
                        return Ok(html);
                    }
                    debug!(url = %attempt, "youtube: page body is not a channel page");
                }
                Err(e) => {
                    debug!(url = %attempt, error = %e, "youtube: channel page fetch failed");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

fn channel_page_url(identity: &Identity) -> Option<String> {
    let v = urlencoding::encode(&identity.value);
    match identity.kind {
        IdentityKind::Handle => Some(format!("https://www.youtube.com/@{v}")),
        IdentityKind::Custom => Some(format!("https://www.youtube.com/c/{v}")),
        IdentityKind::User => Some(format!("https://www.youtube.com/user/{v}")),
        IdentityKind::ChannelId => Some(format!("https://www.youtube.com/channel/{v}")),
        IdentityKind::Username | IdentityKind::Host => None,
    }
}

/// Channel id from page markup: canonical link, then embedded JSON fields.
pub fn extract_channel_id(html: &str) -> Option<String> {
    [&*CANONICAL_RE, &*CHANNEL_ID_RE, &*BROWSE_ID_RE]
        .into_iter()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
}

/// Official uploads feed for a resolved channel.
pub struct YouTubeLocator {
    resolver: Arc<ChannelResolver>,
}

impl YouTubeLocator {
    pub fn new(resolver: Arc<ChannelResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl FeedLocator for YouTubeLocator {
    async fn feed_url(&self, identity: &Identity) -> StrategyResult<String> {
        let channel_id = self.resolver.resolve(identity).await?;
        Ok(format!("{FEED_BASE}{channel_id}"))
    }
}

/// Last resort: read video ids and titles out of the `/videos` page markup.
/// Timestamps are approximated from the "N days ago" text.
pub struct VideosPageStrategy {
    client: reqwest::Client,
    resolver: Arc<ChannelResolver>,
}

impl VideosPageStrategy {
    pub fn new(client: reqwest::Client, resolver: Arc<ChannelResolver>) -> Self {
        Self { client, resolver }
    }
}

#[async_trait]
impl RetrievalStrategy for VideosPageStrategy {
    fn name(&self) -> &str {
        "youtube-videos-scrape"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>> {
        let page = match self.resolver.resolve(identity).await {
            Ok(id) => format!("https://www.youtube.com/channel/{id}/videos"),
            Err(e) => {
                warn!(%identity, error = %e, "youtube: scraping without channel id");
                channel_page_url(identity)
                    .map(|base| format!("{base}/videos"))
                    .ok_or(e)?
            }
        };

        let body = get_body(&self.client, &page).await?;
        let html = String::from_utf8_lossy(&body);
        let mut records = scrape_videos(&html, Utc::now());
        records.truncate(count);
        Ok(records)
    }
}

/// Videos listed in a channel page, in page order, without duplicates.
pub fn scrape_videos(html: &str, now: DateTime<Utc>) -> Vec<RawRecord> {
    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();

    for chunk in html.split("\"videoRenderer\":").skip(1) {
        let Some(caps) = RENDERER_ID_RE.captures(chunk) else {
            continue;
        };
        let id = caps[1].to_string();
        if !seen.insert(id.clone()) {
            continue;
        }
        let title = RENDERER_TITLE_RE
            .captures(chunk)
            .map(|c| unescape_json(&c[1]));
        let published = PUBLISHED_TEXT_RE
            .captures(chunk)
            .and_then(|c| approximate_published(&c[1], now))
            .map(|t| t.to_rfc3339());
        records.push(video_record(id, title, published));
    }

    if records.is_empty() {
        for caps in BARE_VIDEO_ID_RE.captures_iter(html) {
            let id = caps[1].to_string();
            if seen.insert(id.clone()) {
                records.push(video_record(id, None, None));
            }
        }
    }
    records
}

fn video_record(id: String, title: Option<String>, published: Option<String>) -> RawRecord {
    RawRecord {
        link: Some(format!("https://www.youtube.com/watch?v={id}")),
        native_id: Some(id),
        title,
        published,
        ..Default::default()
    }
}

fn unescape_json(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}

/// "3 days ago" → now minus three days. `None` when the age is out of range.
fn approximate_published(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = AGE_RE.captures(text)?;
    let n: i64 = caps[1].parse().ok()?;
    let age = match &caps[2] {
        "second" => TimeDelta::try_seconds(n),
        "minute" => TimeDelta::try_minutes(n),
        "hour" => TimeDelta::try_hours(n),
        "day" => TimeDelta::try_days(n),
        "week" => TimeDelta::try_weeks(n),
        "month" => n.checked_mul(30).and_then(TimeDelta::try_days),
        "year" => n.checked_mul(365).and_then(TimeDelta::try_days),
        _ => None,
    }?;
    now.checked_sub_signed(age)
}
