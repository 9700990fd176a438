use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Platforms ---

/// Platform tag carried on a subscription and detected from its URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    YouTube,
    Twitter,
    Instagram,
    #[default]
    Other,
}

/// Coarse content class of a platform. Filtering rules key off this rather
/// than the concrete platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Video,
    Microblog,
    Other,
}

impl Platform {
    pub fn kind(&self) -> PlatformKind {
        match self {
            Platform::YouTube => PlatformKind::Video,
            Platform::Twitter | Platform::Instagram => PlatformKind::Microblog,
            Platform::Other => PlatformKind::Other,
        }
    }

    /// Display label stamped on every item produced for this platform.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Twitter => "Twitter",
            Platform::Instagram => "Instagram",
            Platform::Other => "Other",
        }
    }

    /// Short prefix used when deriving item ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::YouTube => "yt",
            Platform::Twitter => "tw",
            Platform::Instagram => "ig",
            Platform::Other => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::YouTube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Other => "other",
        };
        f.write_str(s)
    }
}

// --- Subscriptions ---

/// A subscribed creator account. Owned by the surrounding application and
/// read-only to the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub pinned: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub added_at: DateTime<Utc>,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            name: name.into(),
            platform,
            pinned: false,
            added_at: Utc::now(),
        }
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }
}

// --- Canonical items ---

/// Permalink placeholder for records that carried no usable link. Items with
/// this link never reach the caller.
pub const PLACEHOLDER_LINK: &str = "#";

/// One normalized post, identical in shape regardless of platform or of the
/// retrieval strategy that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub link: String,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub date_label: String,
    pub platform: String,
    pub summary: Option<String>,
    pub is_reply: bool,
    pub is_retweet: bool,
}

impl FeedItem {
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.link.trim().is_empty()
            && self.link != PLACEHOLDER_LINK
    }

    /// Replies and reshares count against the per-source secondary quota.
    pub fn is_secondary(&self) -> bool {
        self.is_reply || self.is_retweet
    }
}

/// Strategy-independent raw record. Every retrieval strategy maps its wire
/// format into this before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub native_id: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    /// May contain markup.
    pub description: Option<String>,
    pub link: Option<String>,
    /// Timestamp exactly as delivered by the upstream.
    pub published: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail: Option<String>,
    pub is_reply: Option<bool>,
    pub is_retweet: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> FeedItem {
        FeedItem {
            id: "tw-s1-1".into(),
            source_id: "s1".into(),
            title: title.into(),
            link: link.into(),
            image_url: None,
            published_at: None,
            date_label: "Recently".into(),
            platform: "Twitter".into(),
            summary: None,
            is_reply: false,
            is_retweet: false,
        }
    }

    #[test]
    fn source_reads_application_json() {
        let json = r#"{
            "id": "1700000000000",
            "url": "https://x.com/karpathy",
            "name": "karpathy (X)",
            "platform": "twitter",
            "addedAt": 1700000000000
        }"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.platform, Platform::Twitter);
        assert!(!source.pinned);
        assert_eq!(source.added_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn source_round_trips_pin_flag() {
        let source = Source::new("a", "https://youtube.com/@Google", "Google", Platform::YouTube)
            .pinned(true);
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["pinned"], true);
        assert_eq!(json["platform"], "youtube");
        assert!(json["addedAt"].is_i64());
    }

    #[test]
    fn placeholder_link_is_invalid() {
        assert!(item("hello", "https://x.com/a/status/1").is_valid());
        assert!(!item("hello", PLACEHOLDER_LINK).is_valid());
        assert!(!item("hello", "").is_valid());
        assert!(!item("   ", "https://x.com/a/status/1").is_valid());
    }

    #[test]
    fn reply_or_retweet_is_secondary() {
        let mut it = item("hi", "https://x.com/a/status/1");
        assert!(!it.is_secondary());
        it.is_retweet = true;
        assert!(it.is_secondary());
    }

    #[test]
    fn platform_kinds() {
        assert_eq!(Platform::YouTube.kind(), PlatformKind::Video);
        assert_eq!(Platform::Twitter.kind(), PlatformKind::Microblog);
        assert_eq!(Platform::Other.to_string(), "other");
    }
}
