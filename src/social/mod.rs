// Social platform collaborator: search, single-post lookup, direct messages.
//
// The core never talks HTTP directly. It goes through the SocialPlatform
// trait so profiles can swap the live client for the offline simulation.

pub mod client;
pub mod posts;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;

pub use posts::{EngagementMetrics, RawPost, SearchQuery};

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Run a search and return matching original posts (reshares excluded).
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPost>>;

    /// Re-fetch one post with its current engagement counts.
    async fn fetch_post(&self, post_id: &str) -> Result<RawPost>;

    /// Send a direct message to a user.
    async fn send_message(&self, user_id: &str, text: &str) -> Result<()>;
}
