// MintQueue: turns accepted posts into minted assets.
//
// State machine per post: pending -> minting -> completed | failed.
// Progress checkpoints written to the store as the task advances:
//   10  task picked up
//   30  tier metadata built
//   50  metadata published
//   100 asset created
//
// Only active (pending/minting) tasks live in memory. Once a task completes
// or fails the store owns the record, and enqueue consults the store for
// dedup so a minted post is never queued twice. A failed post may be
// enqueued again.
//
// Drains are serialized and process tasks one at a time in queue order.
// One task failing never stops the rest of the drain.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::budget::{endpoints, BudgetTracker};
use crate::chain::{MetadataPublisher, MintCollaborator, TokenMetadata};
use crate::clock::Clock;
use crate::db::{ClaimRecord, ClaimState, MintStatus, PostRecord, PostUpdate, Store};
use crate::error::{Collaborator, PipelineError, PipelineResult};
use crate::notify::{NotificationKind, Notifier};
use crate::scoring::{ScoredPost, Tier};

pub mod progress {
    pub const PICKED_UP: u8 = 10;
    pub const METADATA_BUILT: u8 = 30;
    pub const METADATA_PUBLISHED: u8 = 50;
    pub const MINTED: u8 = 100;
}

/// An active mint task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintTask {
    pub post: ScoredPost,
    pub status: MintStatus,
    pub progress: u8,
    pub queued_at: DateTime<Utc>,
}

/// Outcome of one task in a drain. Failures carry the post id, never a
/// partially built asset id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MintResult {
    pub post_id: String,
    pub author_id: String,
    pub tier: Tier,
    pub success: bool,
    pub asset_address: Option<String>,
    pub metadata_uri: Option<String>,
    pub error: Option<String>,
}

#[derive(Default)]
struct QueueState {
    order: VecDeque<String>,
    tasks: HashMap<String, MintTask>,
    minted_today: u32,
    minted_day: Option<NaiveDate>,
}

impl QueueState {
    fn roll_day(&mut self, today: NaiveDate) {
        if self.minted_day != Some(today) {
            self.minted_day = Some(today);
            self.minted_today = 0;
        }
    }

    fn remove(&mut self, post_id: &str) {
        self.tasks.remove(post_id);
        self.order.retain(|id| id != post_id);
    }
}

pub struct MintQueue {
    store: Arc<dyn Store>,
    minter: Arc<dyn MintCollaborator>,
    publisher: Arc<dyn MetadataPublisher>,
    notifier: Arc<dyn Notifier>,
    budget: Arc<BudgetTracker>,
    clock: Arc<dyn Clock>,
    site_url: String,
    state: Mutex<QueueState>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl MintQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        minter: Arc<dyn MintCollaborator>,
        publisher: Arc<dyn MetadataPublisher>,
        notifier: Arc<dyn Notifier>,
        budget: Arc<BudgetTracker>,
        clock: Arc<dyn Clock>,
        site_url: &str,
    ) -> Self {
        Self {
            store,
            minter,
            publisher,
            notifier,
            budget,
            clock,
            site_url: site_url.to_string(),
            state: Mutex::new(QueueState::default()),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a post for minting.
    ///
    /// Returns `DuplicateTask` if the post is already queued, minting or
    /// minted. Callers treat that as a no-op.
    pub async fn enqueue(&self, post: ScoredPost) -> PipelineResult<()> {
        let post_id = post.id().to_string();
        let now = self.clock.now();

        // Reserve the id first so concurrent enqueues can't both get through.
        {
            let mut state = self.state();
            if state.tasks.contains_key(&post_id) {
                debug!(post_id = %post_id, "Already queued");
                return Err(PipelineError::DuplicateTask(post_id));
            }
            state.tasks.insert(
                post_id.clone(),
                MintTask {
                    post: post.clone(),
                    status: MintStatus::Pending,
                    progress: 0,
                    queued_at: now,
                },
            );
        }

        let existing = match self.store.get_post(&post_id).await {
            Ok(existing) => existing,
            Err(e) => {
                self.state().remove(&post_id);
                return Err(PipelineError::upstream(Collaborator::Store, e));
            }
        };
        if existing.is_some_and(|r| r.mint_status != MintStatus::Failed) {
            self.state().remove(&post_id);
            debug!(post_id = %post_id, "Already minted or in progress");
            return Err(PipelineError::DuplicateTask(post_id));
        }

        if let Err(e) = self.store.create_post(&PostRecord::pending(&post, now)).await {
            self.state().remove(&post_id);
            return Err(PipelineError::upstream(Collaborator::Store, e));
        }

        let queued = {
            let mut state = self.state();
            state.order.push_back(post_id.clone());
            state.order.len()
        };
        info!(post_id = %post_id, tier = post.tier.as_u8(), queued = queued, "Post queued for minting");
        Ok(())
    }

    /// Reload pending records from the store, oldest detection first, after
    /// a restart. Posts already in memory are left alone. Records stuck in
    /// `minting` are not resumed: the asset may already exist.
    pub async fn resume(&self) -> PipelineResult<usize> {
        let mut records = self
            .store
            .list_posts(Some(MintStatus::Pending))
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?;
        records.reverse();

        let resumed = {
            let mut state = self.state();
            let mut resumed = 0;
            for record in records {
                if state.tasks.contains_key(&record.post_id) {
                    continue;
                }
                state.order.push_back(record.post_id.clone());
                state.tasks.insert(
                    record.post_id.clone(),
                    MintTask {
                        post: record.to_scored(),
                        status: MintStatus::Pending,
                        progress: record.mint_progress,
                        queued_at: record.detected_at,
                    },
                );
                resumed += 1;
            }
            resumed
        };
        if resumed > 0 {
            info!(resumed = resumed, "Resumed pending mints from store");
        }
        Ok(resumed)
    }

    /// Process every pending task, in order.
    ///
    /// Stops early, leaving the rest pending, when the minting budget runs
    /// out.
    pub async fn drain(&self) -> Vec<MintResult> {
        let _drain = self.drain_lock.lock().await;

        let ids: Vec<String> = {
            let state = self.state();
            state
                .order
                .iter()
                .filter(|id| {
                    state
                        .tasks
                        .get(*id)
                        .is_some_and(|t| t.status == MintStatus::Pending)
                })
                .cloned()
                .collect()
        };

        let mut results = Vec::with_capacity(ids.len());
        for post_id in ids {
            if let Err(e) = self.budget.try_acquire(endpoints::MINTING) {
                info!(
                    remaining = self.pending_count(),
                    retry_after_secs = e.retry_after().map(|d| d.as_secs()).unwrap_or_default(),
                    "Minting budget exhausted, leaving tasks queued"
                );
                break;
            }
            if let Some(result) = self.process(&post_id).await {
                results.push(result);
            }
        }

        if !results.is_empty() {
            let ok = results.iter().filter(|r| r.success).count();
            info!(processed = results.len(), succeeded = ok, failed = results.len() - ok, "Mint drain complete");
        }
        results
    }

    /// Queue and immediately mint a single post, bypassing queue order.
    pub async fn mint_now(&self, post: ScoredPost) -> PipelineResult<MintResult> {
        let post_id = post.id().to_string();
        self.enqueue(post).await?;

        let _drain = self.drain_lock.lock().await;
        self.budget.try_acquire(endpoints::MINTING)?;
        self.process(&post_id)
            .await
            .ok_or(PipelineError::NotFound(post_id))
    }

    async fn process(&self, post_id: &str) -> Option<MintResult> {
        let post = {
            let mut state = self.state();
            let task = state.tasks.get_mut(post_id)?;
            task.status = MintStatus::Minting;
            task.post.clone()
        };

        let outcome = self.run_checkpoints(&post).await;

        self.state().remove(post_id);

        Some(match outcome {
            Ok((asset_address, metadata_uri)) => {
                self.after_mint(&post, &asset_address).await;
                MintResult {
                    post_id: post_id.to_string(),
                    author_id: post.post.author_id.clone(),
                    tier: post.tier,
                    success: true,
                    asset_address: Some(asset_address),
                    metadata_uri: Some(metadata_uri),
                    error: None,
                }
            }
            Err(e) => {
                warn!(post_id = %post_id, error = %e, "Mint failed");
                if let Err(store_err) = self
                    .store
                    .update_post(post_id, &PostUpdate::status(MintStatus::Failed))
                    .await
                {
                    warn!(post_id = %post_id, error = %store_err, "Failed to record mint failure");
                }
                MintResult {
                    post_id: post_id.to_string(),
                    author_id: post.post.author_id.clone(),
                    tier: post.tier,
                    success: false,
                    asset_address: None,
                    metadata_uri: None,
                    error: Some(e.to_string()),
                }
            }
        })
    }

    async fn checkpoint(&self, post_id: &str, progress: u8) -> PipelineResult<()> {
        self.store
            .update_progress(post_id, progress)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?;
        if let Some(task) = self.state().tasks.get_mut(post_id) {
            task.progress = task.progress.max(progress);
        }
        Ok(())
    }

    async fn run_checkpoints(&self, post: &ScoredPost) -> PipelineResult<(String, String)> {
        let post_id = post.id();
        let tier = post.tier.max(Tier::Rising);

        self.store
            .update_post(post_id, &PostUpdate::status(MintStatus::Minting))
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?;
        self.checkpoint(post_id, progress::PICKED_UP).await?;

        let metadata = TokenMetadata::for_post(post, tier, &self.site_url);
        self.checkpoint(post_id, progress::METADATA_BUILT).await?;

        let metadata_uri = self
            .publisher
            .publish(&metadata)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Chain, e))?;
        self.checkpoint(post_id, progress::METADATA_PUBLISHED).await?;

        let asset_address = self
            .minter
            .mint(post, &metadata_uri, tier)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Chain, e))?;
        self.store
            .set_asset_address(post_id, &asset_address, &metadata_uri)
            .await
            .map_err(|e| PipelineError::upstream(Collaborator::Store, e))?;
        self.checkpoint(post_id, progress::MINTED).await?;

        Ok((asset_address, metadata_uri))
    }

    /// Claim record, counter and author notification. None of these undo
    /// a completed mint if they fail.
    async fn after_mint(&self, post: &ScoredPost, asset_address: &str) {
        let now = self.clock.now();
        let claim = ClaimRecord {
            asset_address: asset_address.to_string(),
            post_id: post.post.id.clone(),
            author_id: post.post.author_id.clone(),
            status: ClaimState::Pending,
            created_at: now,
        };
        if let Err(e) = self.store.create_claim(&claim).await {
            warn!(post_id = %post.post.id, error = %e, "Failed to create claim record");
        }

        {
            let mut state = self.state();
            state.roll_day(now.date_naive());
            state.minted_today += 1;
        }

        self.notifier.enqueue(
            &post.post.author_id,
            asset_address,
            NotificationKind::Minted(post.tier.max(Tier::Rising)),
        )
        .await;
        info!(post_id = %post.post.id, asset = asset_address, "Minted");
    }

    /// Active tasks in queue order.
    pub fn tasks(&self) -> Vec<MintTask> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state()
            .tasks
            .values()
            .filter(|t| t.status == MintStatus::Pending)
            .count()
    }

    /// Successful mints since UTC midnight.
    pub fn minted_today(&self) -> u32 {
        let today = self.clock.now().date_naive();
        let mut state = self.state();
        state.roll_day(today);
        state.minted_today
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::BudgetPolicy;
    use crate::chain::{SimulatedMinter, StaticUriPublisher};
    use crate::clock::ManualClock;
    use crate::db::MemoryStore;
    use crate::notify::LoggingNotifier;
    use crate::social::{EngagementMetrics, RawPost};
    use chrono::TimeZone;
    use std::time::Duration;

    struct Fixture {
        clock: ManualClock,
        store: Arc<MemoryStore>,
        minter: Arc<SimulatedMinter>,
        notifier: Arc<LoggingNotifier>,
        queue: MintQueue,
    }

    fn fixture(minting: BudgetPolicy) -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 7, 1, 23, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let minter = Arc::new(SimulatedMinter::new());
        let notifier = Arc::new(LoggingNotifier::new(Arc::new(clock.clone()), "https://solspace.app"));
        let budget = Arc::new(
            BudgetTracker::new(Arc::new(clock.clone())).with_policy(endpoints::MINTING, minting),
        );
        let queue = MintQueue::new(
            store.clone(),
            minter.clone(),
            Arc::new(StaticUriPublisher::new("https://metadata.solspace.app")),
            notifier.clone(),
            budget,
            Arc::new(clock.clone()),
            "https://solspace.app",
        );
        Fixture {
            clock,
            store,
            minter,
            notifier,
            queue,
        }
    }

    fn scored(id: &str, tier: Tier) -> ScoredPost {
        ScoredPost {
            post: RawPost {
                id: id.to_string(),
                author_id: format!("author-{id}"),
                author_handle: format!("@{id}"),
                text: "gm".to_string(),
                created_at: Utc.with_ymd_and_hms(2026, 7, 1, 20, 0, 0).unwrap(),
                metrics: EngagementMetrics::new(6000, 500, 100, 0),
            },
            viral_score: 50,
            tier,
        }
    }

    #[tokio::test]
    async fn test_checkpoints_reach_100() {
        let f = fixture(BudgetPolicy::permissive());
        f.queue.enqueue(scored("p1", Tier::Viral)).await.unwrap();
        let results = f.queue.drain().await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].post_id, "p1");
        assert_eq!(f.store.progress_for("p1"), vec![10, 30, 50, 100]);

        let record = f.store.get_post("p1").await.unwrap().unwrap();
        assert_eq!(record.mint_status, MintStatus::Completed);
        assert_eq!(record.metadata_uri.as_deref(), Some("https://metadata.solspace.app/p1/tier3"));
        assert!(f.queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_dedups_active_and_minted() {
        let f = fixture(BudgetPolicy::permissive());
        f.queue.enqueue(scored("p1", Tier::Rising)).await.unwrap();
        assert!(matches!(
            f.queue.enqueue(scored("p1", Tier::Rising)).await,
            Err(PipelineError::DuplicateTask(_))
        ));
        assert_eq!(f.queue.tasks().len(), 1);

        f.queue.drain().await;
        assert!(matches!(
            f.queue.enqueue(scored("p1", Tier::Trending)).await,
            Err(PipelineError::DuplicateTask(_))
        ));
        assert_eq!(f.minter.minted().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let f = fixture(BudgetPolicy::permissive());
        f.minter.fail_post("bad");
        f.queue.enqueue(scored("bad", Tier::Rising)).await.unwrap();
        f.queue.enqueue(scored("good", Tier::Rising)).await.unwrap();

        let results = f.queue.drain().await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].post_id, "bad");
        assert!(results[0].asset_address.is_none());
        assert!(results[1].success);

        let bad = f.store.get_post("bad").await.unwrap().unwrap();
        assert_eq!(bad.mint_status, MintStatus::Failed);
        assert_eq!(f.store.progress_for("bad"), vec![10, 30, 50]);
    }

    #[tokio::test]
    async fn test_failed_post_can_be_requeued() {
        let f = fixture(BudgetPolicy::permissive());
        f.minter.set_failing(true);
        f.queue.enqueue(scored("p1", Tier::Rising)).await.unwrap();
        f.queue.drain().await;

        f.minter.set_failing(false);
        f.queue.enqueue(scored("p1", Tier::Rising)).await.unwrap();
        let results = f.queue.drain().await;
        assert!(results[0].success);
    }

    #[tokio::test]
    async fn test_budget_stops_drain_early() {
        let f = fixture(BudgetPolicy::window(1, Duration::from_secs(86_400), 0.0));
        f.queue.enqueue(scored("a", Tier::Rising)).await.unwrap();
        f.queue.enqueue(scored("b", Tier::Rising)).await.unwrap();

        let results = f.queue.drain().await;
        assert_eq!(results.len(), 1);
        assert_eq!(f.queue.pending_count(), 1);
        assert_eq!(f.queue.tasks()[0].post.post.id, "b");
    }

    #[tokio::test]
    async fn test_success_writes_claim_and_notification() {
        let f = fixture(BudgetPolicy::permissive());
        f.queue.enqueue(scored("p1", Tier::Trending)).await.unwrap();
        let results = f.queue.drain().await;
        let asset = results[0].asset_address.clone().unwrap();

        let claim = f.store.get_claim(&asset).await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimState::Pending);
        assert_eq!(claim.author_id, "author-p1");

        let pending = f.notifier.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::Minted(Tier::Trending));
    }

    #[tokio::test]
    async fn test_minted_today_resets_at_midnight() {
        let f = fixture(BudgetPolicy::permissive());
        f.queue.enqueue(scored("p1", Tier::Rising)).await.unwrap();
        f.queue.drain().await;
        assert_eq!(f.queue.minted_today(), 1);

        f.clock.advance(chrono::Duration::hours(2));
        assert_eq!(f.queue.minted_today(), 0);
    }

    #[tokio::test]
    async fn test_store_outage_rejects_enqueue() {
        let f = fixture(BudgetPolicy::permissive());
        f.store.set_failing(true);
        let err = f.queue.enqueue(scored("p1", Tier::Rising)).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
        assert!(f.queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_resume_reloads_pending_records() {
        let f = fixture(BudgetPolicy::permissive());
        let now = f.clock.now();
        f.store
            .create_post(&PostRecord::pending(&scored("p1", Tier::Rising), now))
            .await
            .unwrap();
        f.store
            .create_post(&PostRecord::pending(&scored("p2", Tier::Viral), now + chrono::Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(f.queue.resume().await.unwrap(), 2);
        assert_eq!(f.queue.resume().await.unwrap(), 0);
        let order: Vec<String> = f.queue.tasks().iter().map(|t| t.post.post.id.clone()).collect();
        assert_eq!(order, vec!["p1", "p2"]);

        let results = f.queue.drain().await;
        assert_eq!(results.iter().filter(|r| r.success).count(), 2);
    }
}
