use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,6});").expect("valid regex")
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static TWIMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://pbs\.twimg\.com/media/[^\s"'<>)]+"#).expect("valid regex")
});
static STATUS_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").expect("valid regex"));
static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/embed/|/shorts/|/vi/)([a-zA-Z0-9_-]{11})")
        .expect("valid regex")
});

/// Remove markup tags, decode common entities and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, " ");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Decode named entities commonly found in feeds plus numeric references.
/// Unknown entities are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => numeric_entity(body),
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn numeric_entity(body: &str) -> Option<char> {
    let num = body.strip_prefix('#')?;
    let code = match num.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => num.parse().ok()?,
    };
    char::from_u32(code)
}

/// Truncate to at most `max` characters, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// First `<img src>` in a markup fragment.
pub fn first_image_src(markup: &str) -> Option<String> {
    IMG_SRC_RE
        .captures(markup)
        .map(|c| decode_entities(&c[1]))
}

/// First `pbs.twimg.com/media` URL in raw text.
pub fn twimg_media_url(text: &str) -> Option<String> {
    TWIMG_RE.find(text).map(|m| m.as_str().to_string())
}

/// Numeric post id from a `/status/<digits>` permalink.
pub fn status_id(link: &str) -> Option<String> {
    STATUS_ID_RE.captures(link).map(|c| c[1].to_string())
}

/// 11-character video id from a watch, short-link, embed, shorts or
/// thumbnail URL.
pub fn video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE.captures(url).map(|c| c[1].to_string())
}
