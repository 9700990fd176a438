use chrono::{DateTime, Duration, Utc};
use creatorfeed_common::{FeedItem, PlatformKind};

/// Recency window and content-class rules for one source's items.
#[derive(Debug, Clone, Copy)]
pub struct RecencyFilter {
    pub window: Duration,
    pub exclude_shorts: bool,
}

impl RecencyFilter {
    pub fn new(window_days: i64, exclude_shorts: bool) -> Self {
        Self {
            window: Duration::try_days(window_days).unwrap_or(Duration::MAX),
            exclude_shorts,
        }
    }

    /// Drop out-of-window items (and Shorts on video platforms), then order
    /// newest first.
    pub fn apply(
        &self,
        items: Vec<FeedItem>,
        kind: PlatformKind,
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        let cutoff = now
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut kept: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| within_window(item, cutoff))
            .filter(|item| {
                !(self.exclude_shorts && kind == PlatformKind::Video && is_short(item))
            })
            .collect();
        sort_newest_first(&mut kept);
        kept
    }
}

/// Items without a usable timestamp stay in.
pub fn within_window(item: &FeedItem, cutoff: DateTime<Utc>) -> bool {
    match item.published_at {
        Some(published) => published >= cutoff,
        None => true,
    }
}

pub fn is_short(item: &FeedItem) -> bool {
    let title = item.title.to_lowercase();
    item.link.contains("/shorts/") || title.contains("#shorts") || title.contains("#short")
}

/// Stable sort, timestamp descending. Missing timestamps sort as oldest.
pub fn sort_newest_first(items: &mut [FeedItem]) {
    items.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
}

/// Epoch millis, with a missing timestamp treated as zero.
pub fn sort_key(item: &FeedItem) -> i64 {
    item.published_at.map(|t| t.timestamp_millis()).unwrap_or(0)
}
