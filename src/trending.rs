use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const REDDIT_HOT_URL: &str = "https://www.reddit.com/r/popular/hot.json?limit=10";
const USER_AGENT: &str = "trendtee/1.0";

#[derive(Clone, Debug, Serialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub source: String,
    pub upvotes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    children: Vec<RedditPost>,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    data: RedditPostData,
}

#[derive(Debug, Deserialize)]
struct RedditPostData {
    id: String,
    title: String,
    ups: u64,
    permalink: String,
}

fn topics_from_listing(listing: RedditListing) -> Vec<Topic> {
    listing
        .data
        .children
        .into_iter()
        .map(|post| Topic {
            id: format!("reddit-{}", post.data.id),
            title: post.data.title,
            source: "Reddit".to_string(),
            upvotes: post.data.ups,
            url: Some(format!("https://reddit.com{}", post.data.permalink)),
        })
        .collect()
}

/// Static topics shown when the feed is unreachable, so the UI always has
/// something to offer.
pub fn fallback_topics() -> Vec<Topic> {
    vec![
        Topic {
            id: "fallback-1".to_string(),
            title: "AI and Machine Learning".to_string(),
            source: "Reddit".to_string(),
            upvotes: 15_000,
            url: None,
        },
        Topic {
            id: "fallback-2".to_string(),
            title: "Climate Change Awareness".to_string(),
            source: "Reddit".to_string(),
            upvotes: 12_000,
            url: None,
        },
        Topic {
            id: "fallback-3".to_string(),
            title: "Space Exploration".to_string(),
            source: "Reddit".to_string(),
            upvotes: 10_000,
            url: None,
        },
    ]
}

async fn fetch_reddit_hot() -> Result<Vec<Topic>> {
    let client = Client::new();
    let listing: RedditListing = client
        .get(REDDIT_HOT_URL)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(topics_from_listing(listing))
}

/// Fetches the trending feed; any failure degrades to the fallback list.
pub async fn trending_topics() -> Vec<Topic> {
    match fetch_reddit_hot().await {
        Ok(topics) if !topics.is_empty() => topics,
        Ok(_) => {
            tracing::warn!("trending feed returned no posts, using fallback topics");
            fallback_topics()
        }
        Err(err) => {
            tracing::warn!(%err, "trending feed unavailable, using fallback topics");
            fallback_topics()
        }
    }
}
