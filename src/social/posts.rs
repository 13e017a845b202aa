// Post types produced by the social-platform collaborator.
//
// A RawPost is immutable once fetched. Everything downstream (scoring,
// queues, store records) works from these fields only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public engagement counts for a single post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub likes: u64,
    pub reshares: u64,
    pub replies: u64,
    pub quotes: u64,
}

impl EngagementMetrics {
    pub fn new(likes: u64, reshares: u64, replies: u64, quotes: u64) -> Self {
        Self {
            likes,
            reshares,
            replies,
            quotes,
        }
    }

    /// Weighted engagement total. Reshares and quotes spread content
    /// further than a like, so they count double.
    pub fn total(&self) -> u64 {
        self.likes
            .saturating_add(self.reshares.saturating_mul(2))
            .saturating_add(self.replies)
            .saturating_add(self.quotes.saturating_mul(2))
    }
}

/// A post as returned by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub author_id: String,
    /// Display handle including the leading `@`, or `@unknown`.
    pub author_handle: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub metrics: EngagementMetrics,
}

/// One search issued against the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    /// Page size to request. `None` lets the platform pick its default.
    pub max_results: Option<u32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}
