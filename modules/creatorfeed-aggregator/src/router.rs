// URL resolution: platform detection, canonical identity, URL cleanup.
// Pure string work, no HTTP.

use std::fmt;

use creatorfeed_common::{FeedError, Platform};
use serde::Serialize;
use url::Url;

const TWITTER_RESERVED: &[&str] = &[
    "home",
    "explore",
    "notifications",
    "messages",
    "i",
    "search",
    "settings",
    "compose",
    "intent",
    "hashtag",
    "share",
    "login",
    "tos",
    "privacy",
];

const INSTAGRAM_RESERVED: &[&str] = &["explore", "reels", "stories", "direct", "accounts"];

const TRACKING_PARAMS: &[&str] = &[
    "app",
    "feature",
    "sub_confirmation",
    "si",
    "s",
    "t",
    "ref",
    "ref_src",
    "igshid",
    "fbclid",
];

/// How the identity value was obtained from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// `youtube.com/@name`
    Handle,
    /// `youtube.com/c/name`
    Custom,
    /// `youtube.com/channel/UC…`
    ChannelId,
    /// `youtube.com/user/name`
    User,
    /// Microblog profile name.
    Username,
    /// No rule matched; the hostname stands in.
    Host,
}

/// Canonical per-platform identity of a source. Used as the retrieval key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub kind: IdentityKind,
    pub value: String,
}

impl Identity {
    pub fn new(kind: IdentityKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn handle(value: impl Into<String>) -> Self {
        Self::new(IdentityKind::Handle, value)
    }

    pub fn channel_id(value: impl Into<String>) -> Self {
        Self::new(IdentityKind::ChannelId, value)
    }

    pub fn username(value: impl Into<String>) -> Self {
        Self::new(IdentityKind::Username, value)
    }

    /// Case-folded form used in cache keys. Channel ids are case-sensitive;
    /// every other kind is not.
    pub fn key(&self) -> String {
        match self.kind {
            IdentityKind::ChannelId => format!("channel:{}", self.value),
            IdentityKind::Handle => format!("handle:{}", self.value.to_lowercase()),
            IdentityKind::Custom => format!("c:{}", self.value.to_lowercase()),
            IdentityKind::User => format!("user:{}", self.value.to_lowercase()),
            IdentityKind::Username => format!("user:{}", self.value.to_lowercase()),
            IdentityKind::Host => format!("host:{}", self.value.to_lowercase()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IdentityKind::Handle | IdentityKind::Username => write!(f, "@{}", self.value),
            IdentityKind::Custom => write!(f, "c/{}", self.value),
            IdentityKind::ChannelId => write!(f, "channel/{}", self.value),
            IdentityKind::User => write!(f, "user/{}", self.value),
            IdentityKind::Host => f.write_str(&self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub platform: Platform,
    pub identity: Identity,
    pub normalized_url: String,
}

/// Parse a subscription URL into platform, identity and a cleaned URL.
/// Rejects malformed URLs and links to a single post or video.
pub fn resolve(raw: &str) -> Result<ResolvedSource, FeedError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| FeedError::Validation(format!("invalid URL {trimmed:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FeedError::Validation(format!(
            "unsupported URL scheme {:?} in {trimmed}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| FeedError::Validation(format!("URL has no host: {trimmed}")))?
        .to_lowercase();

    let platform = detect_platform(&host);
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    reject_single_item(platform, &host, &segments, trimmed)?;

    let identity = match platform {
        Platform::YouTube => youtube_identity(&segments),
        Platform::Twitter => profile_identity(&segments, TWITTER_RESERVED),
        Platform::Instagram => profile_identity(&segments, INSTAGRAM_RESERVED),
        Platform::Other => None,
    }
    .unwrap_or_else(|| Identity::new(IdentityKind::Host, host.clone()));

    Ok(ResolvedSource {
        platform,
        identity,
        normalized_url: normalize_url(url),
    })
}

/// Detect the platform from a hostname. A host matches a domain when it is
/// the domain or one of its subdomains.
pub fn detect_platform(host: &str) -> Platform {
    let host = host.to_lowercase();
    let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if on("youtube.com") || on("youtu.be") {
        Platform::YouTube
    } else if on("twitter.com") || on("x.com") {
        Platform::Twitter
    } else if on("instagram.com") {
        Platform::Instagram
    } else {
        Platform::Other
    }
}

/// Display alias for a newly added subscription, e.g. `Google (YouTube)`.
pub fn suggested_name(resolved: &ResolvedSource) -> String {
    let base = match resolved.identity.kind {
        IdentityKind::Host => resolved.identity.value.trim_start_matches("www.").to_string(),
        _ => resolved.identity.value.clone(),
    };
    match resolved.platform {
        Platform::YouTube => format!("{base} (YouTube)"),
        Platform::Twitter => format!("{base} (X)"),
        Platform::Instagram => format!("{base} (Instagram)"),
        Platform::Other => base,
    }
}

fn reject_single_item(
    platform: Platform,
    host: &str,
    segments: &[&str],
    url: &str,
) -> Result<(), FeedError> {
    let first = segments.first().map(|s| s.to_lowercase());
    let has_rest = segments.len() > 1;

    let single = match platform {
        Platform::YouTube => {
            let short_link = (host == "youtu.be" || host.ends_with(".youtu.be")) && first.is_some();
            short_link
                || first.as_deref() == Some("watch")
                || (matches!(first.as_deref(), Some("shorts" | "live" | "embed")) && has_rest)
        }
        Platform::Twitter => segments
            .iter()
            .skip(1)
            .any(|s| s.eq_ignore_ascii_case("status") || s.eq_ignore_ascii_case("statuses")),
        Platform::Instagram => matches!(first.as_deref(), Some("p" | "reel" | "tv")) && has_rest,
        Platform::Other => false,
    };

    if single {
        return Err(FeedError::Validation(format!(
            "{url} links to a single post; subscribe to the {} profile instead",
            platform.label()
        )));
    }
    Ok(())
}

fn youtube_identity(segments: &[&str]) -> Option<Identity> {
    let first = *segments.first()?;
    if let Some(handle) = first.strip_prefix('@') {
        return non_empty(handle).map(Identity::handle);
    }
    let kind = match first {
        "c" => IdentityKind::Custom,
        "channel" => IdentityKind::ChannelId,
        "user" => IdentityKind::User,
        _ => return None,
    };
    let value = non_empty(segments.get(1)?)?;
    Some(Identity::new(kind, value))
}

fn profile_identity(segments: &[&str], reserved: &[&str]) -> Option<Identity> {
    let first = segments.first()?;
    if reserved.iter().any(|r| first.eq_ignore_ascii_case(r)) {
        return None;
    }
    non_empty(first.trim_start_matches('@')).map(Identity::username)
}

fn non_empty(segment: &str) -> Option<String> {
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}

/// Strip tracking parameters and the fragment.
fn normalize_url(mut url: Url) -> String {
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_lowercase();
            !TRACKING_PARAMS.contains(&k.as_str()) && !k.starts_with("utm_")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(url: &str) -> Identity {
        resolve(url).unwrap().identity
    }

    // --- platform detection ---

    #[test]
    fn detects_platforms_by_host() {
        assert_eq!(detect_platform("www.youtube.com"), Platform::YouTube);
        assert_eq!(detect_platform("m.youtube.com"), Platform::YouTube);
        assert_eq!(detect_platform("youtu.be"), Platform::YouTube);
        assert_eq!(detect_platform("x.com"), Platform::Twitter);
        assert_eq!(detect_platform("mobile.twitter.com"), Platform::Twitter);
        assert_eq!(detect_platform("www.instagram.com"), Platform::Instagram);
        assert_eq!(detect_platform("example.com"), Platform::Other);
    }

    #[test]
    fn lookalike_hosts_are_not_platforms() {
        assert_eq!(detect_platform("dropbox.com"), Platform::Other);
        assert_eq!(detect_platform("notyoutube.com"), Platform::Other);
        assert_eq!(detect_platform("fox.com"), Platform::Other);
    }

    // --- identity rules ---

    #[test]
    fn youtube_identity_forms() {
        assert_eq!(identity("https://www.youtube.com/@Google"), Identity::handle("Google"));
        assert_eq!(
            identity("https://youtube.com/c/LinusTechTips"),
            Identity::new(IdentityKind::Custom, "LinusTechTips")
        );
        assert_eq!(
            identity("https://www.youtube.com/channel/UCK8sQmJBp8GCxrOtXWBpyEA/videos"),
            Identity::channel_id("UCK8sQmJBp8GCxrOtXWBpyEA")
        );
        assert_eq!(
            identity("https://www.youtube.com/user/GoogleDevelopers"),
            Identity::new(IdentityKind::User, "GoogleDevelopers")
        );
    }

    #[test]
    fn youtube_handle_is_percent_decoded() {
        assert_eq!(
            identity("https://www.youtube.com/@%E6%9D%8E%E5%AD%90%E6%9F%92"),
            Identity::handle("李子柒")
        );
    }

    #[test]
    fn youtube_without_rule_falls_back_to_host() {
        assert_eq!(
            identity("https://www.youtube.com/"),
            Identity::new(IdentityKind::Host, "www.youtube.com")
        );
    }

    #[test]
    fn microblog_first_segment() {
        assert_eq!(identity("https://x.com/karpathy"), Identity::username("karpathy"));
        assert_eq!(
            identity("https://twitter.com/@elonmusk/with_replies"),
            Identity::username("elonmusk")
        );
        assert_eq!(
            identity("https://www.instagram.com/natgeo/"),
            Identity::username("natgeo")
        );
    }

    #[test]
    fn reserved_segments_fall_back_to_host() {
        assert_eq!(
            identity("https://x.com/explore"),
            Identity::new(IdentityKind::Host, "x.com")
        );
        assert_eq!(
            identity("https://www.instagram.com/stories/"),
            Identity::new(IdentityKind::Host, "www.instagram.com")
        );
    }

    #[test]
    fn other_platform_uses_host() {
        let resolved = resolve("https://blog.example.com/feed").unwrap();
        assert_eq!(resolved.platform, Platform::Other);
        assert_eq!(resolved.identity, Identity::new(IdentityKind::Host, "blog.example.com"));
    }

    // --- validation ---

    #[test]
    fn malformed_urls_are_rejected() {
        for bad in ["not a url", "", "youtube.com/@Google", "ftp://x.com/a", "mailto:a@b.c"] {
            let err = resolve(bad).unwrap_err();
            assert!(err.is_validation(), "{bad} should fail validation");
        }
    }

    #[test]
    fn single_post_links_are_rejected() {
        for bad in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/shorts/abcdefghijk",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/live/abcdefghijk",
            "https://x.com/karpathy/status/12345",
            "https://twitter.com/jack/status/20",
            "https://www.instagram.com/p/Cabc123/",
            "https://www.instagram.com/reel/Cabc123/",
        ] {
            assert!(resolve(bad).unwrap_err().is_validation(), "{bad} should be rejected");
        }
    }

    #[test]
    fn status_as_username_is_allowed() {
        assert_eq!(identity("https://x.com/status"), Identity::username("status"));
    }

    // --- normalization ---

    #[test]
    fn tracking_params_are_stripped() {
        let resolved =
            resolve("https://www.youtube.com/@Google?sub_confirmation=1&feature=share&si=abc#top")
                .unwrap();
        assert_eq!(resolved.normalized_url, "https://www.youtube.com/@Google");

        let resolved = resolve("https://x.com/karpathy?utm_source=foo&lang=en").unwrap();
        assert_eq!(resolved.normalized_url, "https://x.com/karpathy?lang=en");
    }

    #[test]
    fn identity_keys_fold_case_except_channel_ids() {
        assert_eq!(Identity::username("Karpathy").key(), Identity::username("karpathy").key());
        assert_ne!(Identity::channel_id("UCabc").key(), Identity::channel_id("UCABC").key());
    }

    #[test]
    fn suggested_names() {
        assert_eq!(
            suggested_name(&resolve("https://www.youtube.com/@Google").unwrap()),
            "Google (YouTube)"
        );
        assert_eq!(
            suggested_name(&resolve("https://x.com/karpathy").unwrap()),
            "karpathy (X)"
        );
        assert_eq!(
            suggested_name(&resolve("https://www.example.com/").unwrap()),
            "example.com"
        );
    }
}
