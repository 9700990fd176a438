// Raw record → canonical FeedItem. Pure; the capture time is passed in.

use chrono::{DateTime, NaiveDateTime, Utc};
use creatorfeed_common::{FeedItem, Platform, PlatformKind, RawRecord, PLACEHOLDER_LINK};

use crate::router::{Identity, IdentityKind};
use crate::text_extract;

const TITLE_MAX_CHARS: usize = 150;
const SUMMARY_MAX_CHARS: usize = 200;

/// Everything about the source that the normalizer needs besides the record.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub platform: Platform,
    pub source_id: &'a str,
    pub identity: &'a Identity,
    pub captured_at: DateTime<Utc>,
}

/// Where a reply/reshare flag came from. Upstream flags always win over
/// text heuristics; the two are never blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Explicit(bool),
    Inferred(bool),
}

impl Classification {
    pub fn value(self) -> bool {
        match self {
            Classification::Explicit(v) | Classification::Inferred(v) => v,
        }
    }

    fn pick(explicit: Option<bool>, infer: impl FnOnce() -> bool) -> Self {
        match explicit {
            Some(v) => Classification::Explicit(v),
            None => Classification::Inferred(infer()),
        }
    }
}

pub fn normalize(record: &RawRecord, index: usize, ctx: &NormalizeContext<'_>) -> FeedItem {
    let published_at = record.published.as_deref().and_then(parse_timestamp);
    let raw_text = first_text(record).unwrap_or_default();
    let cleaned = text_extract::clean_text(&raw_text);

    let title = if cleaned.is_empty() {
        placeholder_title(ctx)
    } else {
        text_extract::truncate_chars(&cleaned, TITLE_MAX_CHARS)
    };

    let microblog = ctx.platform.kind() == PlatformKind::Microblog;
    let (is_reply, is_retweet) = classify(record, &cleaned, microblog);

    FeedItem {
        id: derive_id(record, index, ctx),
        source_id: ctx.source_id.to_string(),
        title,
        link: permalink(record, ctx),
        image_url: image_url(record, &raw_text, ctx.platform),
        published_at,
        date_label: relative_label(published_at, ctx.captured_at),
        platform: ctx.platform.label().to_string(),
        summary: summary(record),
        is_reply: is_reply.value(),
        is_retweet: is_retweet.value(),
    }
}

/// Reply and reshare classification. Text heuristics only apply to microblogs.
pub fn classify(
    record: &RawRecord,
    cleaned_text: &str,
    microblog: bool,
) -> (Classification, Classification) {
    let text = cleaned_text.trim_start();
    let is_retweet = Classification::pick(record.is_retweet, || {
        microblog && (text.starts_with("RT @") || text.starts_with("RT by @"))
    });
    let is_reply = Classification::pick(record.is_reply, || {
        microblog && (text.starts_with('@') || text.starts_with("R to @"))
    });
    (is_reply, is_retweet)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn first_text(record: &RawRecord) -> Option<String> {
    [&record.title, &record.text, &record.description]
        .into_iter()
        .filter_map(|field| non_empty(field.as_deref()))
        .find(|s| !text_extract::clean_text(s).is_empty())
        .map(str::to_string)
}

fn placeholder_title(ctx: &NormalizeContext<'_>) -> String {
    match ctx.platform {
        Platform::Twitter => format!("Tweet from @{}", ctx.identity.value),
        Platform::Instagram => format!("Post from @{}", ctx.identity.value),
        Platform::YouTube => "Untitled Video".to_string(),
        Platform::Other => "Untitled".to_string(),
    }
}

fn permalink(record: &RawRecord, ctx: &NormalizeContext<'_>) -> String {
    if let Some(link) = non_empty(record.link.as_deref()) {
        return link.to_string();
    }
    match (ctx.platform, ctx.identity.kind) {
        (Platform::Twitter, IdentityKind::Username) => {
            format!("https://x.com/{}", ctx.identity.value)
        }
        (Platform::Instagram, IdentityKind::Username) => {
            format!("https://www.instagram.com/{}/", ctx.identity.value)
        }
        _ => PLACEHOLDER_LINK.to_string(),
    }
}

/// Platform-native id pulled from a URL.
fn id_from_url(url: &str, platform: Platform) -> Option<String> {
    match platform.kind() {
        PlatformKind::Video => text_extract::video_id(url),
        _ => text_extract::status_id(url),
    }
}

fn native_key(record: &RawRecord, platform: Platform) -> Option<String> {
    let from_native = non_empty(record.native_id.as_deref()).and_then(|id| {
        if id.contains("://") {
            id_from_url(id, platform)
        } else {
            Some(id.trim_start_matches("yt:video:").to_string())
        }
    });

    from_native
        .or_else(|| non_empty(record.link.as_deref()).and_then(|l| id_from_url(l, platform)))
        .or_else(|| match platform.kind() {
            PlatformKind::Video => {
                non_empty(record.thumbnail.as_deref()).and_then(text_extract::video_id)
            }
            _ => None,
        })
}

/// `<prefix>-<source>-<native>` when a native id is recoverable. Otherwise
/// `<prefix>-<source>-<index>-<capture millis>`, which is only unique within
/// one capture.
fn derive_id(record: &RawRecord, index: usize, ctx: &NormalizeContext<'_>) -> String {
    let prefix = ctx.platform.id_prefix();
    match native_key(record, ctx.platform) {
        Some(native) => format!("{prefix}-{}-{native}", ctx.source_id),
        None => format!(
            "{prefix}-{}-{index}-{}",
            ctx.source_id,
            ctx.captured_at.timestamp_millis()
        ),
    }
}

fn youtube_video_id(record: &RawRecord) -> Option<String> {
    non_empty(record.link.as_deref())
        .and_then(text_extract::video_id)
        .or_else(|| {
            let native = non_empty(record.native_id.as_deref())?;
            let native = native.trim_start_matches("yt:video:");
            let valid = native.len() == 11
                && native
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            valid.then(|| native.to_string())
        })
        .or_else(|| non_empty(record.thumbnail.as_deref()).and_then(text_extract::video_id))
}

/// Structured field, then thumbnail, then markup `<img>`, then the platform's
/// media URL pattern.
fn image_url(record: &RawRecord, raw_text: &str, platform: Platform) -> Option<String> {
    if let Some(url) =
        non_empty(record.image_url.as_deref()).or(non_empty(record.thumbnail.as_deref()))
    {
        return Some(url.to_string());
    }
    let markup_img = [record.description.as_deref(), Some(raw_text)]
        .into_iter()
        .flatten()
        .find_map(text_extract::first_image_src);
    if markup_img.is_some() {
        return markup_img;
    }
    match platform {
        Platform::Twitter => [record.text.as_deref(), record.description.as_deref(), Some(raw_text)]
            .into_iter()
            .flatten()
            .find_map(text_extract::twimg_media_url),
        Platform::YouTube => {
            youtube_video_id(record).map(|id| format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"))
        }
        _ => None,
    }
}

fn summary(record: &RawRecord) -> Option<String> {
    let description = non_empty(record.description.as_deref())?;
    let cleaned = text_extract::clean_text(description);
    (!cleaned.is_empty()).then(|| text_extract::truncate_chars(&cleaned, SUMMARY_MAX_CHARS))
}

/// Parse the timestamp forms seen across upstreams: RFC 3339, RFC 2822, the
/// X API form and the rss2json proxy form (UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .or_else(|_| DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Human-relative label. Display only; never used for ordering.
pub fn relative_label(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(published) = published else {
        return "Recently".to_string();
    };
    let age = now.signed_duration_since(published);
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if hours < 1 {
        ago(minutes, "minute")
    } else if days < 1 {
        ago(hours, "hour")
    } else {
        ago(days, "day")
    }
}

fn ago(n: i64, unit: &str) -> String {
    let plural = if n == 1 { "" } else { "s" };
    format!("{n} {unit}{plural} ago")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn tweet_ctx(identity: &Identity) -> NormalizeContext<'_> {
        NormalizeContext {
            platform: Platform::Twitter,
            source_id: "src1",
            identity,
            captured_at: now(),
        }
    }

    fn video_ctx(identity: &Identity) -> NormalizeContext<'_> {
        NormalizeContext {
            platform: Platform::YouTube,
            source_id: "yt1",
            identity,
            captured_at: now(),
        }
    }

    // --- ids ---

    #[test]
    fn id_from_status_link() {
        let identity = Identity::username("karpathy");
        let record = RawRecord {
            title: Some("hello".into()),
            link: Some("https://x.com/karpathy/status/12345".into()),
            ..Default::default()
        };
        let item = normalize(&record, 0, &tweet_ctx(&identity));
        assert_eq!(item.id, "tw-src1-12345");
        assert_eq!(item.source_id, "src1");
    }

    #[test]
    fn id_is_stable_across_captures() {
        let identity = Identity::username("karpathy");
        let record = RawRecord {
            native_id: Some("12345".into()),
            title: Some("hello".into()),
            ..Default::default()
        };
        let mut later = tweet_ctx(&identity);
        later.captured_at = now() + chrono::Duration::hours(1);
        assert_eq!(
            normalize(&record, 0, &tweet_ctx(&identity)).id,
            normalize(&record, 3, &later).id
        );
    }

    #[test]
    fn nitter_guid_url_yields_status_id() {
        let identity = Identity::username("karpathy");
        let record = RawRecord {
            native_id: Some("https://nitter.net/karpathy/status/777#m".into()),
            title: Some("hello".into()),
            ..Default::default()
        };
        assert_eq!(normalize(&record, 0, &tweet_ctx(&identity)).id, "tw-src1-777");
    }

    #[test]
    fn youtube_native_prefix_is_stripped() {
        let identity = Identity::channel_id("UCabc");
        let record = RawRecord {
            native_id: Some("yt:video:dQw4w9WgXcQ".into()),
            title: Some("A video".into()),
            link: Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()),
            ..Default::default()
        };
        let item = normalize(&record, 0, &video_ctx(&identity));
        assert_eq!(item.id, "yt-yt1-dQw4w9WgXcQ");
        assert_eq!(item.platform, "YouTube");
    }

    #[test]
    fn synthesized_id_without_native() {
        let identity = Identity::username("karpathy");
        let record = RawRecord {
            title: Some("hello".into()),
            ..Default::default()
        };
        let item = normalize(&record, 4, &tweet_ctx(&identity));
        assert_eq!(item.id, format!("tw-src1-4-{}", now().timestamp_millis()));
    }

    // --- text ---

    #[test]
    fn title_falls_back_through_fields() {
        let identity = Identity::username("karpathy");
        let record = RawRecord {
            title: Some("   ".into()),
            text: Some("<p></p>".into()),
            description: Some("<b>from</b> description".into()),
            link: Some("https://x.com/k/status/1".into()),
            ..Default::default()
        };
        let item = normalize(&record, 0, &tweet_ctx(&identity));
        assert_eq!(item.title, "from description");
        assert_eq!(item.summary.as_deref(), Some("from description"));
    }

    #[test]
    fn placeholder_titles() {
        let identity = Identity::username("karpathy");
        let item = normalize(&RawRecord::default(), 0, &tweet_ctx(&identity));
        assert_eq!(item.title, "Tweet from @karpathy");
        assert_eq!(item.link, "https://x.com/karpathy");

        let channel = Identity::channel_id("UCabc");
        let item = normalize(&RawRecord::default(), 0, &video_ctx(&channel));
        assert_eq!(item.title, "Untitled Video");
        assert_eq!(item.link, PLACEHOLDER_LINK);
        assert!(!item.is_valid());
    }

    #[test]
    fn long_titles_are_truncated_after_decoding() {
        let identity = Identity::username("k");
        let record = RawRecord {
            title: Some(format!("{} &amp; tail", "é".repeat(160))),
            ..Default::default()
        };
        let item = normalize(&record, 0, &tweet_ctx(&identity));
        assert_eq!(item.title.chars().count(), 150);
        assert!(!item.title.contains("&amp"));
    }

    // --- images ---

    #[test]
    fn image_priority() {
        let identity = Identity::username("k");
        let mut record = RawRecord {
            title: Some("t".into()),
            text: Some("see https://pbs.twimg.com/media/abc.jpg".into()),
            description: Some(r#"<img src="https://nitter.net/pic/x.jpg">"#.into()),
            image_url: Some("https://pbs.twimg.com/media/structured.jpg".into()),
            ..Default::default()
        };
        let ctx = tweet_ctx(&identity);
        assert_eq!(
            normalize(&record, 0, &ctx).image_url.as_deref(),
            Some("https://pbs.twimg.com/media/structured.jpg")
        );
        record.image_url = None;
        assert_eq!(
            normalize(&record, 0, &ctx).image_url.as_deref(),
            Some("https://nitter.net/pic/x.jpg")
        );
        record.description = None;
        assert_eq!(
            normalize(&record, 0, &ctx).image_url.as_deref(),
            Some("https://pbs.twimg.com/media/abc.jpg")
        );
        record.text = None;
        assert_eq!(normalize(&record, 0, &ctx).image_url, None);
    }

    #[test]
    fn youtube_thumbnail_from_video_id() {
        let identity = Identity::channel_id("UCabc");
        let record = RawRecord {
            title: Some("v".into()),
            link: Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()),
            ..Default::default()
        };
        assert_eq!(
            normalize(&record, 0, &video_ctx(&identity)).image_url.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
    }

    // --- classification ---

    #[test]
    fn explicit_flags_win_over_text() {
        let record = RawRecord {
            is_reply: Some(false),
            is_retweet: Some(false),
            ..Default::default()
        };
        let (reply, retweet) = classify(&record, "@someone RT @x", true);
        assert_eq!(reply, Classification::Explicit(false));
        assert_eq!(retweet, Classification::Explicit(false));
    }

    #[test]
    fn text_heuristics_for_microblogs() {
        let record = RawRecord::default();
        assert_eq!(classify(&record, "@bob hi", true).0, Classification::Inferred(true));
        assert_eq!(classify(&record, "RT @bob: hi", true).1, Classification::Inferred(true));
        assert_eq!(classify(&record, "RT by @bob: hi", true).1, Classification::Inferred(true));
        assert_eq!(classify(&record, "R to @bob: hi", true).0, Classification::Inferred(true));
        assert_eq!(
            classify(&record, "plain", true),
            (Classification::Inferred(false), Classification::Inferred(false))
        );
    }

    #[test]
    fn videos_are_never_inferred_secondary() {
        assert_eq!(
            classify(&RawRecord::default(), "@channel collab", false).0,
            Classification::Inferred(false)
        );
    }

    // --- timestamps ---

    #[test]
    fn parses_upstream_timestamp_forms() {
        let expected = Utc.with_ymd_and_hms(2018, 10, 10, 20, 19, 24).unwrap();
        for raw in [
            "2018-10-10T20:19:24Z",
            "2018-10-10T22:19:24+02:00",
            "Wed, 10 Oct 2018 20:19:24 GMT",
            "Wed Oct 10 20:19:24 +0000 2018",
            "2018-10-10 20:19:24",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "{raw}");
        }
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn relative_labels() {
        let now = now();
        assert_eq!(relative_label(None, now), "Recently");
        assert_eq!(relative_label(Some(now - chrono::Duration::seconds(20)), now), "Just now");
        assert_eq!(relative_label(Some(now + chrono::Duration::minutes(5)), now), "Just now");
        assert_eq!(relative_label(Some(now - chrono::Duration::minutes(1)), now), "1 minute ago");
        assert_eq!(
            relative_label(Some(now - chrono::Duration::minutes(59)), now),
            "59 minutes ago"
        );
        assert_eq!(relative_label(Some(now - chrono::Duration::hours(3)), now), "3 hours ago");
        assert_eq!(relative_label(Some(now - chrono::Duration::days(1)), now), "1 day ago");
        assert_eq!(relative_label(Some(now - chrono::Duration::days(12)), now), "12 days ago");
    }

    #[test]
    fn unparseable_timestamp_is_recently() {
        let identity = Identity::username("k");
        let record = RawRecord {
            title: Some("t".into()),
            published: Some("not a date".into()),
            ..Default::default()
        };
        let item = normalize(&record, 0, &tweet_ctx(&identity));
        assert_eq!(item.published_at, None);
        assert_eq!(item.date_label, "Recently");
    }
}
