use serde::{Deserialize, Serialize};

// --- Public output types ---

/// Profile summary from `UserByScreenName`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: Option<String>,
    pub profile_image_url: Option<String>,
    pub followers_count: Option<u64>,
    pub following_count: Option<u64>,
    pub tweet_count: Option<u64>,
    pub verified: bool,
}

/// A tweet flattened out of the timeline instructions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub text: String,
    /// X API form, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
    pub created_at: Option<String>,
    pub retweet_count: Option<u64>,
    pub like_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub image_url: Option<String>,
    pub link: String,
    pub is_reply: bool,
    pub is_retweet: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTimeline {
    pub user: XUser,
    pub tweets: Vec<Tweet>,
}

// --- GraphQL wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserData<T> {
    pub user: Option<ResultWrapper<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultWrapper<T> {
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResult {
    pub rest_id: Option<String>,
    #[serde(default)]
    pub is_blue_verified: bool,
    pub legacy: Option<UserLegacy>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserLegacy {
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub profile_image_url_https: Option<String>,
    pub followers_count: Option<u64>,
    pub friends_count: Option<u64>,
    pub statuses_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimelineUser {
    pub timeline_v2: Option<TimelineV2>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TimelineV2 {
    pub timeline: Option<Timeline>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Timeline {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Instruction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Entry {
    pub content: Option<EntryContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntryContent {
    #[serde(rename = "itemContent")]
    pub item_content: Option<ItemContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemContent {
    pub tweet_results: Option<ResultWrapper<TweetResult>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TweetResult {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub rest_id: Option<String>,
    pub legacy: Option<TweetLegacy>,
    pub quoted_status_result: Option<Box<ResultWrapper<TweetResult>>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TweetLegacy {
    #[serde(default)]
    pub full_text: String,
    pub created_at: Option<String>,
    pub retweet_count: Option<u64>,
    pub favorite_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub in_reply_to_status_id_str: Option<String>,
    pub in_reply_to_user_id_str: Option<String>,
    pub extended_entities: Option<ExtendedEntities>,
    pub retweeted_status_result: Option<Box<ResultWrapper<TweetResult>>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtendedEntities {
    #[serde(default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Media {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_url_https: Option<String>,
}

impl TweetLegacy {
    fn photo(&self) -> Option<&str> {
        self.extended_entities
            .as_ref()?
            .media
            .iter()
            .find(|m| m.kind == "photo")
            .and_then(|m| m.media_url_https.as_deref())
    }
}

impl TweetResult {
    fn retweeted(&self) -> Option<&TweetResult> {
        self.legacy
            .as_ref()?
            .retweeted_status_result
            .as_ref()?
            .result
            .as_ref()
    }

    fn quoted(&self) -> Option<&TweetResult> {
        self.quoted_status_result.as_ref()?.result.as_ref()
    }

    fn own_photo(&self) -> Option<&str> {
        self.legacy.as_ref()?.photo()
    }

    /// First photo on the tweet itself, then on the retweeted tweet, then on
    /// the quoted tweet.
    fn image_url(&self) -> Option<String> {
        self.own_photo()
            .or_else(|| self.retweeted()?.own_photo())
            .or_else(|| self.quoted()?.own_photo())
            .map(str::to_string)
    }

    pub(crate) fn into_tweet(self, screen_name: &str) -> Option<Tweet> {
        if self.typename.as_deref() != Some("Tweet") {
            return None;
        }
        let id = self.rest_id.clone()?;
        let image_url = self.image_url();
        let is_retweet = self.retweeted().is_some();
        let legacy = self.legacy?;
        let is_reply =
            legacy.in_reply_to_status_id_str.is_some() || legacy.in_reply_to_user_id_str.is_some();

        Some(Tweet {
            link: format!("https://x.com/{screen_name}/status/{id}"),
            id,
            text: legacy.full_text,
            created_at: legacy.created_at,
            retweet_count: legacy.retweet_count,
            like_count: legacy.favorite_count,
            reply_count: legacy.reply_count,
            image_url,
            is_reply,
            is_retweet,
        })
    }
}

impl UserResult {
    pub(crate) fn into_user(self) -> Option<XUser> {
        let legacy = self.legacy?;
        Some(XUser {
            id: self.rest_id?,
            username: legacy.screen_name,
            name: legacy.name,
            description: legacy.description,
            profile_image_url: legacy
                .profile_image_url_https
                .map(|u| u.replace("_normal", "_400x400")),
            followers_count: legacy.followers_count,
            following_count: legacy.friends_count,
            tweet_count: legacy.statuses_count,
            verified: self.is_blue_verified,
        })
    }
}

impl Timeline {
    /// Tweets from every `TimelineAddEntries` instruction, in timeline order.
    pub(crate) fn into_tweets(self, screen_name: &str) -> Vec<Tweet> {
        self.instructions
            .into_iter()
            .filter(|i| i.kind == "TimelineAddEntries")
            .flat_map(|i| i.entries)
            .filter_map(|e| e.content?.item_content?.tweet_results?.result)
            .filter_map(|t| t.into_tweet(screen_name))
            .collect()
    }
}
