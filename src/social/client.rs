// Social platform HTTP client: bearer-authenticated JSON over HTTPS.
//
// A thin reqwest wrapper with a generic GET helper, in the shape of the v2
// search/lookup/DM endpoints. Every request carries a timeout so a hung
// upstream surfaces as an ordinary error instead of blocking a poll.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::posts::{EngagementMetrics, RawPost, SearchQuery};
use super::SocialPlatform;
use crate::error::PipelineError;

/// Default API endpoint.
pub const DEFAULT_SOCIAL_API_URL: &str = "https://api.twitter.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const POST_FIELDS: &str = "public_metrics,created_at,author_id";

pub struct HttpSocialClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpSocialClient {
    pub fn new(base_url: &str, bearer_token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("viralmint/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "Social API GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GET {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }
}

#[async_trait]
impl SocialPlatform for HttpSocialClient {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPost>> {
        let max_results = query.max_results.map(|n| n.clamp(10, 100).to_string());
        let mut params: Vec<(&str, &str)> = vec![
            ("query", query.query.as_str()),
            ("tweet.fields", POST_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", "username"),
        ];
        if let Some(ref n) = max_results {
            params.push(("max_results", n));
        }

        let resp: SearchResponse = self
            .get_json("/2/tweets/search/recent", &params)
            .await
            .with_context(|| format!("Search failed for query {:?}", query.query))?;

        Ok(convert_search_response(resp))
    }

    async fn fetch_post(&self, post_id: &str) -> Result<RawPost> {
        let path = format!("/2/tweets/{post_id}");
        let resp: LookupResponse = self
            .get_json(
                &path,
                &[
                    ("tweet.fields", POST_FIELDS),
                    ("expansions", "author_id"),
                    ("user.fields", "username"),
                ],
            )
            .await?;

        let users = user_index(resp.includes.as_ref());
        Ok(ApiPost::from_value(resp.data)?.into_raw(&users)?)
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<()> {
        let url = format!(
            "{}/2/dm_conversations/with/{}/messages",
            self.base_url, user_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&MessageBody { text })
            .send()
            .await
            .with_context(|| format!("Failed to send message to {user_id}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Message to {user_id} returned {status}: {body}");
        }
        Ok(())
    }
}

/// Convert a search page into posts, skipping any post whose payload is
/// malformed. One bad item never fails the whole page.
pub fn convert_search_response(resp: SearchResponse) -> Vec<RawPost> {
    let users = user_index(resp.includes.as_ref());
    resp.data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| match ApiPost::from_value(item).and_then(|post| post.into_raw(&users)) {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!(error = %e, "Skipping post with invalid metrics");
                None
            }
        })
        .collect()
}

fn user_index(includes: Option<&Includes>) -> HashMap<&str, &str> {
    includes
        .map(|inc| {
            inc.users
                .iter()
                .map(|u| (u.id.as_str(), u.username.as_str()))
                .collect()
        })
        .unwrap_or_default()
}

// -- Serde types for the search and lookup endpoints --

// Posts stay untyped until conversion so a single malformed item is
// rejected on its own instead of failing the whole page.

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub data: Option<Vec<serde_json::Value>>,
    pub includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    pub data: serde_json::Value,
    pub includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiPost {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<String>,
    pub public_metrics: Option<ApiMetrics>,
}

/// Counts arrive as signed integers and may be missing.
#[derive(Debug, Deserialize)]
pub struct ApiMetrics {
    pub like_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub reply_count: Option<i64>,
    pub quote_count: Option<i64>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    text: &'a str,
}

impl ApiPost {
    /// Decode one post item. Wrongly typed fields reject only this post.
    pub fn from_value(value: serde_json::Value) -> Result<Self, PipelineError> {
        let post_id = value
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or("<unknown>")
            .to_string();
        serde_json::from_value(value).map_err(|e| PipelineError::InvalidMetrics {
            post_id,
            reason: e.to_string(),
        })
    }

    /// Validate and convert into a RawPost.
    pub fn into_raw(self, users: &HashMap<&str, &str>) -> Result<RawPost, PipelineError> {
        let invalid = |reason: &str| PipelineError::InvalidMetrics {
            post_id: self.id.clone(),
            reason: reason.to_string(),
        };

        let metrics = self
            .public_metrics
            .as_ref()
            .ok_or_else(|| invalid("missing public_metrics"))?;

        let count = |value: Option<i64>, name: &str| -> Result<u64, PipelineError> {
            let v = value.unwrap_or(0);
            u64::try_from(v).map_err(|_| invalid(&format!("negative {name}: {v}")))
        };

        let metrics = EngagementMetrics {
            likes: count(metrics.like_count, "like_count")?,
            reshares: count(metrics.retweet_count, "retweet_count")?,
            replies: count(metrics.reply_count, "reply_count")?,
            quotes: count(metrics.quote_count, "quote_count")?,
        };

        let created_at = self
            .created_at
            .as_deref()
            .ok_or_else(|| invalid("missing created_at"))
            .and_then(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| invalid(&format!("unparseable created_at: {ts}")))
            })?;

        let author_id = self.author_id.clone().unwrap_or_default();
        let author_handle = users
            .get(author_id.as_str())
            .map(|name| format!("@{name}"))
            .unwrap_or_else(|| "@unknown".to_string());

        Ok(RawPost {
            id: self.id,
            author_id,
            author_handle,
            text: self.text,
            created_at,
            metrics,
        })
    }
}
