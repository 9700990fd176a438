// Authenticated X GraphQL timeline. Highest-fidelity Twitter strategy: carries
// explicit reply/retweet flags and structured media.

use std::time::Duration;

use async_trait::async_trait;
use creatorfeed_common::RawRecord;
use twitter_client::{Tweet, TwitterClient};

use super::RetrievalStrategy;
use crate::error::{StrategyError, StrategyResult};
use crate::router::{Identity, IdentityKind};

pub struct TwitterGraphQlStrategy {
    client: TwitterClient,
}

impl TwitterGraphQlStrategy {
    pub fn new(client: TwitterClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RetrievalStrategy for TwitterGraphQlStrategy {
    fn name(&self) -> &str {
        "x-graphql"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(15)
    }

    async fn fetch(&self, identity: &Identity, count: usize) -> StrategyResult<Vec<RawRecord>> {
        if identity.kind != IdentityKind::Username {
            return Err(StrategyError::Unresolved(identity.to_string()));
        }
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let timeline = self.client.user_tweets(&identity.value, count).await?;
        Ok(timeline.tweets.into_iter().map(tweet_record).collect())
    }
}

fn tweet_record(tweet: Tweet) -> RawRecord {
    RawRecord {
        native_id: Some(tweet.id),
        title: None,
        text: Some(tweet.text),
        description: None,
        link: Some(tweet.link),
        published: tweet.created_at,
        image_url: tweet.image_url,
        thumbnail: None,
        is_reply: Some(tweet.is_reply),
        is_retweet: Some(tweet.is_retweet),
    }
}
