// Re-tiering sweep over already-minted posts.
//
// For each completed post detected within the horizon: re-fetch its
// engagement, recompute the tier, and when it went up, ask the program to
// upgrade the asset, publish the new tier's metadata, store the new tier
// and queue an upgrade notification. Posts at the top tier are skipped
// before any network call. Tiers only ever go up.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::budget::{endpoints, BudgetTracker};
use crate::chain::{MetadataPublisher, MintCollaborator, TokenMetadata};
use crate::clock::Clock;
use crate::db::{MintStatus, PostRecord, PostUpdate, Store};
use crate::error::{Collaborator, PipelineError, PipelineResult};
use crate::notify::{NotificationKind, Notifier};
use crate::scoring::{age_hours, compute_tier, compute_viral_score, ScoredPost, Tier, TierThresholds};
use crate::social::SocialPlatform;

pub const DEFAULT_HORIZON_HOURS: i64 = 48;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierUpgrade {
    pub post_id: String,
    pub from: Tier,
    pub to: Tier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Posts whose engagement was re-fetched.
    pub checked: usize,
    pub skipped_max_tier: usize,
    pub upgrades: Vec<TierUpgrade>,
    pub failed: usize,
    /// The lookup budget ran out before every post was checked.
    pub budget_exhausted: bool,
}

pub struct TierSweep {
    store: Arc<dyn Store>,
    social: Arc<dyn SocialPlatform>,
    minter: Arc<dyn MintCollaborator>,
    publisher: Arc<dyn MetadataPublisher>,
    notifier: Arc<dyn Notifier>,
    budget: Arc<BudgetTracker>,
    clock: Arc<dyn Clock>,
    thresholds: TierThresholds,
    horizon: Duration,
    site_url: String,
    run_lock: tokio::sync::Mutex<()>,
}

pub struct TierSweepParts {
    pub store: Arc<dyn Store>,
    pub social: Arc<dyn SocialPlatform>,
    pub minter: Arc<dyn MintCollaborator>,
    pub publisher: Arc<dyn MetadataPublisher>,
    pub notifier: Arc<dyn Notifier>,
    pub budget: Arc<BudgetTracker>,
    pub clock: Arc<dyn Clock>,
}

impl TierSweep {
    pub fn new(parts: TierSweepParts, thresholds: TierThresholds, horizon: Duration, site_url: &str) -> Self {
        Self {
            store: parts.store,
            social: parts.social,
            minter: parts.minter,
            publisher: parts.publisher,
            notifier: parts.notifier,
            budget: parts.budget,
            clock: parts.clock,
            thresholds,
            horizon,
            site_url: site_url.to_string(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// One pass. Per-post failures are counted, not returned; only a store
    /// outage while listing posts fails the whole sweep.
    pub async fn run(&self) -> PipelineResult<SweepReport> {
        let _run = self.run_lock.lock().await;
        let now = self.clock.now();

        let candidates: Vec<PostRecord> = self
            .store
            .get_posts_since(now - self.horizon)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?
            .into_iter()
            .filter(|r| r.mint_status == MintStatus::Completed)
            .collect();

        let mut report = SweepReport::default();
        for record in candidates {
            if record.tier.is_max() {
                report.skipped_max_tier += 1;
                continue;
            }
            if let Err(e) = self.budget.try_acquire(endpoints::LOOKUP) {
                info!(
                    retry_after_secs = e.retry_after().map(|d| d.as_secs()).unwrap_or_default(),
                    "Lookup budget exhausted, sweep paused"
                );
                report.budget_exhausted = true;
                break;
            }

            report.checked += 1;
            match self.check(&record).await {
                Ok(Some(upgrade)) => report.upgrades.push(upgrade),
                Ok(None) => {}
                Err(e) => {
                    warn!(post_id = %record.post_id, error = %e, "Re-tier check failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            upgraded = report.upgrades.len(),
            skipped = report.skipped_max_tier,
            failed = report.failed,
            "Tier sweep complete"
        );
        Ok(report)
    }

    async fn check(&self, record: &PostRecord) -> PipelineResult<Option<TierUpgrade>> {
        let fresh = self
            .social
            .fetch_post(&record.post_id)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Social, e))?;

        let now = self.clock.now();
        let age = age_hours(fresh.created_at, now);
        let new_tier = compute_tier(&fresh.metrics, age, &self.thresholds);
        if new_tier <= record.tier {
            debug!(post_id = %record.post_id, tier = record.tier.as_u8(), "No tier change");
            return Ok(None);
        }

        let Some(asset_address) = record.asset_address.as_deref() else {
            return Err(PipelineError::NotFound(record.post_id.clone()));
        };

        self.minter
            .check_tier_upgrade(asset_address, &fresh.metrics)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Chain, e))?;

        let viral_score = compute_viral_score(&fresh.metrics, age);
        let metrics = fresh.metrics;
        let upgraded = ScoredPost {
            post: fresh,
            viral_score,
            tier: new_tier,
        };
        let metadata = TokenMetadata::for_post(&upgraded, new_tier, &self.site_url);
        let metadata_uri = self
            .publisher
            .publish(&metadata)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Chain, e))?;

        let update = PostUpdate {
            tier: Some(new_tier),
            viral_score: Some(viral_score),
            metrics: Some(metrics),
            metadata_uri: Some(metadata_uri),
            mint_status: None,
        };
        self.store
            .update_post(&record.post_id, &update)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?;

        self.notifier.enqueue(
            &record.author_id,
            asset_address,
            NotificationKind::Upgraded {
                from: record.tier,
                to: new_tier,
            },
        )
        .await;

        info!(
            post_id = %record.post_id,
            from = record.tier.as_u8(),
            to = new_tier.as_u8(),
            "Tier upgraded"
        );
        Ok(Some(TierUpgrade {
            post_id: record.post_id.clone(),
            from: record.tier,
            to: new_tier,
        }))
    }
}
