pub mod error;
pub mod types;

pub use error::{Result, TwitterError};
pub use types::{Tweet, UserTimeline, XUser};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use types::{GraphQlResponse, TimelineUser, UserData, UserResult};

const GRAPHQL_BASE: &str = "https://api.twitter.com/graphql";

/// Query id for the UserByScreenName operation.
const USER_BY_SCREEN_NAME: &str = "xmU6X_CKVnQ5lSrCbAmJsg/UserByScreenName";

/// Query id for the UserTweets operation.
const USER_TWEETS: &str = "E3opETHurmVJflFsUBVuUQ/UserTweets";

/// Public bearer token shipped with the X web app.
const WEB_BEARER_TOKEN: &str =
    "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs=1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_COUNT: u32 = 20;
const MAX_COUNT: u32 = 100;

/// Client for the X web GraphQL API, authenticated with a browser session
/// (`ct0` + `auth_token` cookies).
pub struct TwitterClient {
    client: reqwest::Client,
    ct0: String,
    auth_token: String,
    bearer_token: String,
}

impl TwitterClient {
    pub fn new(ct0: String, auth_token: String) -> Result<Self> {
        if ct0.is_empty() || auth_token.is_empty() {
            return Err(TwitterError::MissingCredentials);
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            ct0,
            auth_token,
            bearer_token: WEB_BEARER_TOKEN.to_string(),
        })
    }

    pub fn with_bearer_token(mut self, token: String) -> Self {
        self.bearer_token = token;
        self
    }

    /// Look up a profile by its @handle.
    pub async fn user_by_screen_name(&self, screen_name: &str) -> Result<XUser> {
        let variables = json!({ "screen_name": screen_name });
        let features = json!({
            "hidden_profile_subscriptions_enabled": true,
            "rweb_tipjar_consumption_enabled": true,
            "responsive_web_graphql_exclude_directive_enabled": true,
            "verified_phone_label_enabled": false,
            "subscriptions_verification_info_is_identity_verified_enabled": true,
            "subscriptions_verification_info_verified_since_enabled": true,
            "highlights_tweets_tab_ui_enabled": true,
            "responsive_web_twitter_article_notes_tab_enabled": true,
            "subscriptions_feature_can_gift_premium": true,
            "creator_subscriptions_tweet_preview_api_enabled": true,
            "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
            "responsive_web_graphql_timeline_navigation_enabled": true,
        });

        let body = self.query(USER_BY_SCREEN_NAME, &variables, &features).await?;
        parse_user(&body, screen_name)
    }

    /// Fetch the latest tweets for a handle. `count` is clamped to 1..=100.
    pub async fn user_tweets(&self, screen_name: &str, count: u32) -> Result<UserTimeline> {
        let count = clamp_count(count);
        tracing::debug!(screen_name, count, "Fetching X user timeline");

        let user = self.user_by_screen_name(screen_name).await?;

        let variables = json!({
            "userId": user.id,
            "count": count,
            "includePromotedContent": false,
            "withQuickPromoteEligibilityTweetFields": false,
            "withVoice": true,
            "withV2Timeline": true,
        });
        let features = json!({
            "rweb_tipjar_consumption_enabled": true,
            "responsive_web_graphql_exclude_directive_enabled": true,
            "verified_phone_label_enabled": false,
            "creator_subscriptions_tweet_preview_api_enabled": true,
            "responsive_web_graphql_timeline_navigation_enabled": true,
            "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
            "communities_web_enable_tweet_community_results_fetch": true,
            "c9s_tweet_anatomy_moderator_badge_enabled": true,
            "articles_preview_enabled": true,
            "responsive_web_edit_tweet_api_enabled": true,
            "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
            "view_counts_everywhere_api_enabled": true,
            "longform_notetweets_consumption_enabled": true,
            "responsive_web_twitter_article_tweet_consumption_enabled": true,
            "tweet_awards_web_tipping_enabled": false,
            "creator_subscriptions_quote_tweet_preview_enabled": false,
            "freedom_of_speech_not_reach_fetch_enabled": true,
            "standardized_nudges_misinfo": true,
            "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
            "rweb_video_timestamps_enabled": true,
            "longform_notetweets_rich_text_read_enabled": true,
            "longform_notetweets_inline_media_enabled": true,
            "responsive_web_enhance_cards_enabled": false,
        });

        let body = self.query(USER_TWEETS, &variables, &features).await?;
        let mut tweets = parse_tweets(&body, &user.username)?;
        tweets.truncate(count as usize);
        tracing::info!(screen_name, count = tweets.len(), "Fetched X tweets");

        Ok(UserTimeline { user, tweets })
    }

    async fn query(
        &self,
        operation: &str,
        variables: &serde_json::Value,
        features: &serde_json::Value,
    ) -> Result<Vec<u8>> {
        let url = format!("{GRAPHQL_BASE}/{operation}");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("variables", variables.to_string()),
                ("features", features.to_string()),
            ])
            .bearer_auth(&self.bearer_token)
            .header("cookie", format!("ct0={}; auth_token={}", self.ct0, self.auth_token))
            .header("x-csrf-token", &self.ct0)
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-client-language", "en")
            .header("accept-language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

fn clamp_count(count: u32) -> u32 {
    if count == 0 {
        DEFAULT_COUNT
    } else {
        count.min(MAX_COUNT)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>> {
    let resp: GraphQlResponse<T> = serde_json::from_slice(body)?;
    Ok(resp.data)
}

fn parse_user(body: &[u8], screen_name: &str) -> Result<XUser> {
    decode::<UserData<UserResult>>(body)?
        .and_then(|d| d.user?.result)
        .and_then(UserResult::into_user)
        .ok_or_else(|| TwitterError::UserNotFound(screen_name.to_string()))
}

fn parse_tweets(body: &[u8], screen_name: &str) -> Result<Vec<Tweet>> {
    let timeline = decode::<UserData<TimelineUser>>(body)?
        .and_then(|d| d.user?.result?.timeline_v2?.timeline);
    Ok(timeline
        .map(|t| t.into_tweets(screen_name))
        .unwrap_or_default())
}
