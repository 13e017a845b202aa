// Detectors: find posts that are going viral.
//
// Four profiles implement the same Detector trait. Three of them share the
// budget-gated search core in `search`; the simulated one serves a canned
// set without any I/O. A detector never propagates collaborator errors:
// poll() always returns something usable plus a status saying how fresh it is.

pub mod cache;
pub mod conservative;
pub mod full_access;
pub mod lightweight;
pub mod search;
pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scheduler::ScheduleSlot;
use crate::scoring::ScoredPost;

pub use cache::PostCache;
pub use conservative::ConservativeDetector;
pub use full_access::FullAccessDetector;
pub use lightweight::LightweightDetector;
pub use search::SearchCore;
pub use simulated::SimulatedDetector;

/// How a poll went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PollStatus {
    Ok,
    /// The search budget is spent; posts are the cached set.
    BudgetExhausted { retry_after: Duration },
    /// Every query failed; posts are the cached set.
    UpstreamError(String),
}

impl PollStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, PollStatus::Ok)
    }

    /// Short label for dashboards. Budget exhaustion reads as a pause.
    pub fn describe(&self) -> String {
        match self {
            PollStatus::Ok => "ok".to_string(),
            PollStatus::BudgetExhausted { retry_after } => {
                format!("resuming in {}m", retry_after.as_secs().div_ceil(60))
            }
            PollStatus::UpstreamError(msg) => format!("error: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Newly qualifying posts on `Ok`, the cached set otherwise.
    pub posts: Vec<ScoredPost>,
    pub status: PollStatus,
}

/// Running counters for the status view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub polls: u64,
    /// Distinct posts returned by the platform across all polls.
    pub scanned: u64,
    /// Posts that qualified for at least tier 1.
    pub qualified: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Aggregate engagement over the cached set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngagementStats {
    pub total_engagement: u64,
    pub average_likes: f64,
    pub average_reshares: f64,
}

impl EngagementStats {
    pub fn from_posts(posts: &[ScoredPost]) -> Self {
        if posts.is_empty() {
            return Self::default();
        }
        let n = posts.len() as f64;
        let total_engagement = posts
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.post.metrics.total()));
        let likes: u64 = posts.iter().map(|p| p.post.metrics.likes).sum();
        let reshares: u64 = posts.iter().map(|p| p.post.metrics.reshares).sum();
        Self {
            total_engagement,
            average_likes: likes as f64 / n,
            average_reshares: reshares as f64 / n,
        }
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Profile name for logs and the status view.
    fn name(&self) -> &'static str;

    async fn poll(&self) -> PollOutcome;

    /// Tracked qualifying posts, deduplicated, oldest first.
    fn queued_posts(&self) -> Vec<ScoredPost>;

    /// Recurring poll cadence. `None` means manual polling only.
    fn poll_interval(&self) -> Option<Duration>;

    /// Slot holding this detector's recurring poll task.
    fn schedule(&self) -> &ScheduleSlot;

    fn scan_stats(&self) -> ScanStats;

    fn engagement_stats(&self) -> EngagementStats {
        EngagementStats::from_posts(&self.queued_posts())
    }

    /// Cancel the recurring poll, if any. Idempotent.
    fn stop(&self) {
        self.schedule().cancel();
    }
}
