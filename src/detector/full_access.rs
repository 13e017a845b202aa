// Full-access detector: several topic searches per poll.
//
// Runs one search per topic hashtag every five minutes, merging the results.
// Backed by a generous window budget.

use std::time::Duration;

use async_trait::async_trait;

use super::search::SearchCore;
use super::{Detector, PollOutcome, ScanStats};
use crate::scheduler::ScheduleSlot;
use crate::scoring::ScoredPost;
use crate::social::SearchQuery;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

const TOPICS: [&str; 4] = ["#NFT", "#Solana", "#Web3", "#Blockchain"];

/// One query per topic, reshares excluded.
pub fn default_queries() -> Vec<SearchQuery> {
    TOPICS
        .iter()
        .map(|topic| SearchQuery::new(format!("{topic} -is:retweet")))
        .collect()
}

pub struct FullAccessDetector {
    core: SearchCore,
    schedule: ScheduleSlot,
}

impl FullAccessDetector {
    pub fn new(core: SearchCore) -> Self {
        Self {
            core,
            schedule: ScheduleSlot::new(),
        }
    }
}

#[async_trait]
impl Detector for FullAccessDetector {
    fn name(&self) -> &'static str {
        "full-access"
    }

    async fn poll(&self) -> PollOutcome {
        self.core.poll().await
    }

    fn queued_posts(&self) -> Vec<ScoredPost> {
        self.core.cached()
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(POLL_INTERVAL)
    }

    fn schedule(&self) -> &ScheduleSlot {
        &self.schedule
    }

    fn scan_stats(&self) -> ScanStats {
        self.core.scan_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queries_exclude_reshares() {
        let queries = default_queries();
        assert_eq!(queries.len(), 4);
        assert!(queries.iter().all(|q| q.query.ends_with("-is:retweet")));
        assert_eq!(queries[0].query, "#NFT -is:retweet");
    }
}
