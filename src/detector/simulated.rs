// Simulated detector: a fixed canned set, no I/O, manual polling only.
//
// The canned posts are scored once at construction. A poll returns the ones
// not returned before, so only the first poll yields anything.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::cache::PostCache;
use super::{Detector, PollOutcome, PollStatus, ScanStats};
use crate::clock::Clock;
use crate::scheduler::ScheduleSlot;
use crate::scoring::{score_post, ScoredPost, TierThresholds};
use crate::social::{EngagementMetrics, RawPost};

/// The demo posts, created relative to `now`.
pub fn canned_posts(now: DateTime<Utc>) -> Vec<RawPost> {
    vec![
        RawPost {
            id: "1".to_string(),
            author_id: "123456".to_string(),
            author_handle: "@cryptoinfluencer".to_string(),
            text: "Web3 is revolutionizing how we think about content ownership! #blockchain #web3"
                .to_string(),
            created_at: now,
            metrics: EngagementMetrics::new(15_000, 3_000, 500, 0),
        },
        RawPost {
            id: "2".to_string(),
            author_id: "234567".to_string(),
            author_handle: "@nftcreator".to_string(),
            text: "Just launched our new NFT collection! Check it out #NFT #solana".to_string(),
            created_at: now - ChronoDuration::minutes(30),
            metrics: EngagementMetrics::new(8_000, 1_500, 300, 0),
        },
        RawPost {
            id: "3".to_string(),
            author_id: "345678".to_string(),
            author_handle: "@defibuilder".to_string(),
            text: "The future of decentralized finance is here. Building on SONIC blockchain! #defi #sonic"
                .to_string(),
            created_at: now - ChronoDuration::hours(1),
            metrics: EngagementMetrics::new(3_500, 750, 200, 0),
        },
    ]
}

pub struct SimulatedDetector {
    canned: Vec<ScoredPost>,
    seen: Mutex<PostCache>,
    clock: Arc<dyn Clock>,
    stats: Mutex<ScanStats>,
    schedule: ScheduleSlot,
}

impl SimulatedDetector {
    pub fn new(clock: Arc<dyn Clock>, thresholds: &TierThresholds) -> Self {
        let now = clock.now();
        let canned: Vec<ScoredPost> = canned_posts(now)
            .into_iter()
            .map(|post| score_post(post, now, thresholds))
            .filter(|scored| scored.tier.is_viral())
            .collect();
        Self {
            seen: Mutex::new(PostCache::new(canned.len())),
            canned,
            clock,
            stats: Mutex::new(ScanStats::default()),
            schedule: ScheduleSlot::new(),
        }
    }
}

#[async_trait]
impl Detector for SimulatedDetector {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn poll(&self) -> PollOutcome {
        let fresh: Vec<ScoredPost> = {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            self.canned
                .iter()
                .filter(|post| seen.upsert((*post).clone()))
                .cloned()
                .collect()
        };

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.polls += 1;
        stats.scanned += fresh.len() as u64;
        stats.qualified += fresh.len() as u64;
        stats.last_poll_at = Some(self.clock.now());

        PollOutcome {
            posts: fresh,
            status: PollStatus::Ok,
        }
    }

    fn queued_posts(&self) -> Vec<ScoredPost> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).to_vec()
    }

    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    fn schedule(&self) -> &ScheduleSlot {
        &self.schedule
    }

    fn scan_stats(&self) -> ScanStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
