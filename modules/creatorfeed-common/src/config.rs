use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{FeedError, Result};

const MAX_WINDOW_DAYS: i64 = 3650;

const DEFAULT_RSS2JSON_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";

const DEFAULT_NITTER_INSTANCES: &[&str] = &[
    "https://nitter.net",
    "https://xcancel.com",
    "https://nitter.poast.org",
    "https://nitter.catsarch.com",
];

const DEFAULT_FEED_MIRRORS: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://corsproxy.io/?",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// Runtime configuration loaded from environment variables.
/// Holds credentials and endpoint lists; tuning knobs live in the TOML
/// [`FeedSettings`].
#[derive(Debug, Clone)]
pub struct Config {
    // X/Twitter session (both required for the authenticated strategy)
    pub twitter_ct0: Option<String>,
    pub twitter_auth_token: Option<String>,
    pub twitter_bearer_token: Option<String>,

    // Public mirrors
    pub rss2json_endpoint: String,
    pub nitter_instances: Vec<String>,
    pub feed_mirrors: Vec<String>,

    pub settings_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            twitter_ct0: None,
            twitter_auth_token: None,
            twitter_bearer_token: None,
            rss2json_endpoint: DEFAULT_RSS2JSON_ENDPOINT.to_string(),
            nitter_instances: DEFAULT_NITTER_INSTANCES.iter().map(|s| s.to_string()).collect(),
            feed_mirrors: DEFAULT_FEED_MIRRORS.iter().map(|s| s.to_string()).collect(),
            settings_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            twitter_ct0: non_empty_env("TWITTER_CT0"),
            twitter_auth_token: non_empty_env("TWITTER_AUTH_TOKEN"),
            twitter_bearer_token: non_empty_env("TWITTER_BEARER_TOKEN"),
            rss2json_endpoint: non_empty_env("RSS2JSON_ENDPOINT")
                .unwrap_or(defaults.rss2json_endpoint),
            nitter_instances: list_env("NITTER_INSTANCES").unwrap_or(defaults.nitter_instances),
            feed_mirrors: list_env("FEED_MIRRORS").unwrap_or(defaults.feed_mirrors),
            settings_path: non_empty_env("CREATORFEED_SETTINGS").map(PathBuf::from),
        };

        config.log_keys();
        config
    }

    /// Session cookies for the authenticated X strategy, when both are set.
    pub fn twitter_session(&self) -> Option<(&str, &str)> {
        match (&self.twitter_ct0, &self.twitter_auth_token) {
            (Some(ct0), Some(auth)) => Some((ct0.as_str(), auth.as_str())),
            _ => None,
        }
    }

    /// Settings from `CREATORFEED_SETTINGS`, or defaults when unset.
    pub fn settings(&self) -> Result<FeedSettings> {
        match &self.settings_path {
            Some(path) => load_settings(path),
            None => Ok(FeedSettings::default()),
        }
    }

    pub fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.chars().take(4).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  TWITTER_CT0: {}", preview_opt(&self.twitter_ct0));
        tracing::info!("  TWITTER_AUTH_TOKEN: {}", preview_opt(&self.twitter_auth_token));
        tracing::info!("  TWITTER_BEARER_TOKEN: {}", preview_opt(&self.twitter_bearer_token));
        tracing::info!("  RSS2JSON_ENDPOINT: {}", self.rss2json_endpoint);
        tracing::info!("  NITTER_INSTANCES: {}", self.nitter_instances.join(", "));
        tracing::info!("  FEED_MIRRORS: {} configured", self.feed_mirrors.len());
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn list_env(key: &str) -> Option<Vec<String>> {
    let raw = non_empty_env(key)?;
    Some(parse_list(&raw))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// --- TOML settings ---

/// Tuning knobs for aggregation. Every field has a default, so an empty
/// file is a valid settings file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedSettings {
    /// Items older than this are dropped.
    pub window_days: i64,
    /// N: items kept per source.
    pub items_per_source: usize,
    /// K: cap on replies/reshares among the N.
    pub max_secondary_per_source: usize,
    /// Records requested from upstream per source.
    pub fetch_count: usize,
    pub cache_ttl_secs: u64,
    pub exclude_shorts: bool,
    /// Handle → channel id, consulted before any page scrape.
    pub known_channels: HashMap<String, String>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            window_days: 30,
            items_per_source: 3,
            max_secondary_per_source: 1,
            fetch_count: 20,
            cache_ttl_secs: 30 * 60,
            exclude_shorts: true,
            known_channels: HashMap::new(),
        }
    }
}

impl FeedSettings {
    pub fn validate(&self) -> Result<()> {
        if self.window_days <= 0 || self.window_days > MAX_WINDOW_DAYS {
            return Err(FeedError::Config(format!(
                "window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.items_per_source == 0 {
            return Err(FeedError::Config("items_per_source must be at least 1".into()));
        }
        if self.fetch_count < self.items_per_source {
            return Err(FeedError::Config(format!(
                "fetch_count ({}) must be >= items_per_source ({})",
                self.fetch_count, self.items_per_source
            )));
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML settings file.
pub fn load_settings(path: &Path) -> Result<FeedSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    let settings = parse_settings(&content)
        .map_err(|e| FeedError::Config(format!("{}: {e}", path.display())))?;
    Ok(settings)
}

fn parse_settings(content: &str) -> std::result::Result<FeedSettings, String> {
    let settings: FeedSettings = toml::from_str(content).map_err(|e| e.to_string())?;
    settings.validate().map_err(|e| e.to_string())?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_are_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, FeedSettings::default());
        assert_eq!(settings.cache_ttl_secs, 1800);
        assert_eq!(settings.window_days, 30);
    }

    #[test]
    fn known_channels_table() {
        let settings = parse_settings(
            r#"
            items_per_source = 5
            fetch_count = 10

            [known_channels]
            google = "UCK8sQmJBp8GCxrOtXWBpyEA"
            "#,
        )
        .unwrap();
        assert_eq!(settings.items_per_source, 5);
        assert_eq!(
            settings.known_channels.get("google").map(String::as_str),
            Some("UCK8sQmJBp8GCxrOtXWBpyEA")
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(parse_settings("items_per_sorce = 3").is_err());
    }

    #[test]
    fn rejects_nonsense_values() {
        assert!(parse_settings("items_per_source = 0").is_err());
        assert!(parse_settings("window_days = -1").is_err());
        assert!(parse_settings("window_days = 9223372036854775807").is_err());
        assert!(parse_settings("window_days = 3650").is_ok());
        assert!(parse_settings("items_per_source = 30\nfetch_count = 20").is_err());
    }

    #[test]
    fn list_parsing_trims_slashes_and_blanks() {
        assert_eq!(
            parse_list(" https://nitter.net/ ,, https://xcancel.com"),
            vec!["https://nitter.net", "https://xcancel.com"]
        );
    }

    #[test]
    fn session_requires_both_cookies() {
        let mut config = Config::default();
        config.twitter_ct0 = Some("abc".into());
        assert!(config.twitter_session().is_none());
        config.twitter_auth_token = Some("def".into());
        assert_eq!(config.twitter_session(), Some(("abc", "def")));
    }
}
