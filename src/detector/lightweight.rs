// Lightweight detector: a single broad popularity search.

use std::time::Duration;

use async_trait::async_trait;

use super::search::SearchCore;
use super::{Detector, PollOutcome, ScanStats};
use crate::scheduler::ScheduleSlot;
use crate::scoring::ScoredPost;
use crate::social::SearchQuery;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub fn default_queries() -> Vec<SearchQuery> {
    vec![SearchQuery::new("min_faves:1000 -is:retweet lang:en")]
}

pub struct LightweightDetector {
    core: SearchCore,
    schedule: ScheduleSlot,
}

impl LightweightDetector {
    pub fn new(core: SearchCore) -> Self {
        Self {
            core,
            schedule: ScheduleSlot::new(),
        }
    }
}

#[async_trait]
impl Detector for LightweightDetector {
    fn name(&self) -> &'static str {
        "lightweight"
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
