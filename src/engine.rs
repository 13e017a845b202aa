// ViralEngine: the surface the core exposes to its callers.
//
// Wraps a built Runtime and drives the cycle:
//   detector poll -> mint queue enqueue -> mint drain
// plus two independent timers for the notification drain and the
// re-tiering sweep. The poll timer lives in the detector's own schedule
// slot, so stopping one detector never touches the queues.

use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::budget::BudgetStatus;
use crate::detector::{EngagementStats, PollOutcome, PollStatus};
use crate::error::{PipelineError, PipelineResult};
use crate::notify::{NotificationKind, NotifierStatus};
use crate::profile::{Profile, Runtime};
use crate::queue::{MintResult, SweepReport};
use crate::scheduler::PeriodicTask;
use crate::scoring::{score_post, ScoredPost, Tier};
use crate::social::RawPost;

/// Dashboard snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub profile: &'static str,
    pub monitoring: bool,
    pub scanned_count: u64,
    pub potential_count: usize,
    pub minted_today_count: u32,
    pub pending_mints: usize,
    pub engagement: EngagementStats,
    pub last_poll: Option<PollStatus>,
    pub notifications: NotifierStatus,
    pub budget_status: Vec<BudgetStatus>,
}

/// What one poll-and-mint cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub poll: PollOutcome,
    pub enqueued: usize,
    pub mints: Vec<MintResult>,
}

pub struct ViralEngine {
    runtime: Runtime,
    timers: Mutex<Vec<PeriodicTask>>,
    last_poll: Mutex<Option<PollStatus>>,
}

impl ViralEngine {
    pub fn new(runtime: Runtime) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            timers: Mutex::new(Vec::new()),
            last_poll: Mutex::new(None),
        })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn profile(&self) -> Profile {
        self.runtime.profile()
    }

    fn timers(&self) -> std::sync::MutexGuard<'_, Vec<PeriodicTask>> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn queue_status(&self) -> QueueStatus {
        let rt = &self.runtime;
        QueueStatus {
            profile: rt.profile().as_str(),
            monitoring: self.is_monitoring(),
            scanned_count: rt.detector.scan_stats().scanned,
            potential_count: rt.detector.queued_posts().len(),
            minted_today_count: rt.mint_queue.minted_today(),
            pending_mints: rt.mint_queue.pending_count(),
            engagement: rt.detector.engagement_stats(),
            last_poll: self
                .last_poll
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            notifications: rt.notifier.status(),
            budget_status: rt.budget.snapshot(),
        }
    }

    pub fn queued_posts(&self) -> Vec<ScoredPost> {
        self.runtime.detector.queued_posts()
    }

    /// Poll the detector once and queue whatever newly qualified.
    pub async fn poll_once(&self) -> (PollOutcome, usize) {
        let outcome = self.runtime.detector.poll().await;
        *self.last_poll.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.status.clone());

        let mut enqueued = 0;
        if outcome.status.is_ok() {
            for post in &outcome.posts {
                match self.runtime.mint_queue.enqueue(post.clone()).await {
                    Ok(()) => enqueued += 1,
                    Err(PipelineError::DuplicateTask(_)) => {}
                    Err(e) => warn!(post_id = %post.id(), error = %e, "Failed to queue post"),
                }
            }
        } else {
            debug!(status = %outcome.status.describe(), "Poll served cached posts");
        }
        (outcome, enqueued)
    }

    /// One full cycle: poll, queue, drain the mint queue.
    pub async fn run_cycle(&self) -> CycleReport {
        let (poll, enqueued) = self.poll_once().await;
        let mints = self.runtime.mint_queue.drain().await;
        CycleReport { poll, enqueued, mints }
    }

    /// Pick up pending mints and undelivered notifications a previous
    /// process left in the store. Returns (mints, notifications).
    pub async fn resume(&self) -> PipelineResult<(usize, usize)> {
        let mints = self.runtime.mint_queue.resume().await?;
        let notifications = self
            .runtime
            .notifier
            .restore()
            .await
            .map_err(|e| PipelineError::upstream(crate::error::Collaborator::Store, e))?;
        Ok((mints, notifications))
    }

    pub async fn drain_mints(&self) -> Vec<MintResult> {
        self.runtime.mint_queue.drain().await
    }

    pub async fn drain_notifications(&self) -> usize {
        self.runtime.notifier.drain().await
    }

    pub async fn sweep(&self) -> PipelineResult<SweepReport> {
        self.runtime.sweep.run().await
    }

    /// Score a post and mint it right away. Posts below tier 1 are minted
    /// at tier 1.
    pub async fn mint_post(&self, post: RawPost) -> PipelineResult<String> {
        let now = self.runtime.clock.now();
        let mut scored = score_post(post, now, &self.runtime.settings.thresholds);
        scored.raise_tier(Tier::Rising);

        let result = self.runtime.mint_queue.mint_now(scored).await?;
        match result.asset_address {
            Some(asset) if result.success => Ok(asset),
            _ => Err(PipelineError::UpstreamUnavailable {
                collaborator: crate::error::Collaborator::Chain,
                message: result.error.unwrap_or_else(|| "mint failed".to_string()),
            }),
        }
    }

    /// Queue a creator notification. `previous` marks a tier upgrade.
    pub async fn notify_creator(&self, author_id: &str, asset_address: &str, tier: Tier, previous: Option<Tier>) {
        self.runtime
            .notifier
            .enqueue(author_id, asset_address, NotificationKind::new(tier, previous))
            .await;
    }

    pub fn is_monitoring(&self) -> bool {
        self.runtime.detector.schedule().is_active() || !self.timers().is_empty()
    }

    /// Start the recurring poll (if the profile has one), the notification
    /// drain and the re-tiering sweep. Restarting replaces running timers.
    pub fn start_monitoring(self: &Arc<Self>) {
        self.stop_monitoring();
        let settings = &self.runtime.settings;

        if let Some(period) = self.runtime.detector.poll_interval() {
            let engine = Arc::downgrade(self);
            let task = PeriodicTask::spawn("detector-poll", period, move || {
                let engine = engine.clone();
                async move {
                    if let Some(engine) = engine.upgrade() {
                        engine.run_cycle().await;
                    }
                }
            });
            self.runtime.detector.schedule().install(task);
        }

        let notify = spawn_weak(self, "notification-drain", settings.notify_interval, |engine| async move {
            engine.drain_notifications().await;
        });
        let sweep = spawn_weak(self, "tier-sweep", settings.sweep_interval, |engine| async move {
            if let Err(e) = engine.sweep().await {
                warn!(error = %e, "Tier sweep failed");
            }
        });
        self.timers().extend([notify, sweep]);

        info!(profile = %self.profile(), "Monitoring started");
    }

    /// Cancel every timer. In-flight ticks finish. Idempotent.
    pub fn stop_monitoring(&self) {
        self.runtime.detector.stop();
        let timers: Vec<PeriodicTask> = self.timers().drain(..).collect();
        if !timers.is_empty() {
            for timer in &timers {
                timer.cancel();
            }
            info!("Monitoring stopped");
        }
    }
}

/// Spawn a periodic task holding only a weak reference to the engine, so
/// timers never keep it alive.
fn spawn_weak<F, Fut>(engine: &Arc<ViralEngine>, name: &str, period: std::time::Duration, f: F) -> PeriodicTask
where
    F: Fn(Arc<ViralEngine>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let weak: Weak<ViralEngine> = Arc::downgrade(engine);
    let f = Arc::new(f);
    PeriodicTask::spawn(name, period, move || {
        let weak = weak.clone();
        let f = f.clone();
        async move {
            if let Some(engine) = weak.upgrade() {
                f(engine).await;
            }
        }
    })
}
