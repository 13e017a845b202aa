// End-to-end tests for the detect -> mint -> re-tier -> notify pipeline.
//
// Every collaborator is an in-crate fake (SimulatedPlatform, SimulatedMinter,
// StaticUriPublisher, MemoryStore) and time comes from a ManualClock, so
// these run fully offline and deterministically.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use viralmint::budget::{endpoints, BudgetPolicy, BudgetTracker};
use viralmint::chain::{SimulatedMinter, StaticUriPublisher};
use viralmint::clock::{Clock, ManualClock};
use viralmint::db::{MemoryStore, MintStatus, Store};
use viralmint::detector::{full_access, Detector, FullAccessDetector, PollStatus, SearchCore};
use viralmint::error::PipelineError;
use viralmint::notify::{NotificationKind, NotificationQueue, Notifier};
use viralmint::queue::retier::DEFAULT_HORIZON_HOURS;
use viralmint::queue::{MintQueue, TierSweep, TierSweepParts};
use viralmint::scoring::{score_post, ScoredPost, Tier, TierThresholds};
use viralmint::social::simulated::SimulatedPlatform;
use viralmint::social::{EngagementMetrics, RawPost};

const SITE: &str = "https://solspace.app";
const METADATA: &str = "https://metadata.solspace.app";

struct Pipeline {
    clock: ManualClock,
    social: Arc<SimulatedPlatform>,
    store: Arc<MemoryStore>,
    minter: Arc<SimulatedMinter>,
    notifier: Arc<NotificationQueue>,
    budget: Arc<BudgetTracker>,
    mints: MintQueue,
    sweep: TierSweep,
}

fn pipeline(dm_policy: BudgetPolicy) -> Pipeline {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap());
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let social = Arc::new(SimulatedPlatform::new());
    let store = Arc::new(MemoryStore::new());
    let minter = Arc::new(SimulatedMinter::new());
    let publisher = Arc::new(StaticUriPublisher::new(METADATA));
    let budget = Arc::new(BudgetTracker::new(shared_clock.clone()).with_policy(endpoints::DM, dm_policy));
    let notifier = Arc::new(NotificationQueue::new(
        social.clone(),
        budget.clone(),
        shared_clock.clone(),
        SITE,
        3,
    ));

    let mints = MintQueue::new(
        store.clone(),
        minter.clone(),
        publisher.clone(),
        notifier.clone(),
        budget.clone(),
        shared_clock.clone(),
        SITE,
    );
    let sweep = TierSweep::new(
        TierSweepParts {
            store: store.clone(),
            social: social.clone(),
            minter: minter.clone(),
            publisher,
            notifier: notifier.clone(),
            budget: budget.clone(),
            clock: shared_clock,
        },
        TierThresholds::standard(),
        chrono::Duration::hours(DEFAULT_HORIZON_HOURS),
        SITE,
    );

    Pipeline {
        clock,
        social,
        store,
        minter,
        notifier,
        budget,
        mints,
        sweep,
    }
}

fn raw(id: &str, likes: u64, clock: &ManualClock) -> RawPost {
    RawPost {
        id: id.to_string(),
        author_id: format!("author-{id}"),
        author_handle: format!("@{id}"),
        text: format!("post {id} #web3"),
        created_at: clock.now() - chrono::Duration::hours(10),
        metrics: EngagementMetrics::new(likes, likes / 5, likes / 10, 0),
    }
}

fn scored(id: &str, likes: u64, clock: &ManualClock) -> ScoredPost {
    score_post(raw(id, likes, clock), clock.now(), &TierThresholds::standard())
}

// ============================================================
// MintQueue
// ============================================================

#[tokio::test]
async fn drain_single_post_reaches_progress_100() {
    let p = pipeline(BudgetPolicy::permissive());
    p.mints.enqueue(scored("p1", 1_500, &p.clock)).await.unwrap();

    let results = p.mints.drain().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].post_id, "p1");
    assert!(results[0].success);
    assert_eq!(p.store.progress_for("p1"), vec![10, 30, 50, 100]);

    let record = p.store.get_post("p1").await.unwrap().unwrap();
    assert_eq!(record.mint_status, MintStatus::Completed);
    assert_eq!(record.mint_progress, 100);
    assert_eq!(record.asset_address, results[0].asset_address);
}

#[tokio::test]
async fn concurrent_enqueue_creates_one_task() {
    let p = pipeline(BudgetPolicy::permissive());
    let post = scored("p1", 1_500, &p.clock);

    let (a, b) = tokio::join!(p.mints.enqueue(post.clone()), p.mints.enqueue(post.clone()));
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(a.err().or(b.err()), Some(PipelineError::DuplicateTask(_))));
    assert_eq!(p.mints.tasks().len(), 1);

    p.mints.drain().await;
    assert_eq!(p.minter.minted().len(), 1);
}

#[tokio::test]
async fn one_failure_does_not_block_the_rest() {
    let p = pipeline(BudgetPolicy::permissive());
    p.minter.fail_post("p2");
    for id in ["p1", "p2", "p3"] {
        p.mints.enqueue(scored(id, 1_500, &p.clock)).await.unwrap();
    }

    let results = p.mints.drain().await;
    let outcome: Vec<(&str, bool)> = results.iter().map(|r| (r.post_id.as_str(), r.success)).collect();
    assert_eq!(outcome, vec![("p1", true), ("p2", false), ("p3", true)]);

    let failed = &results[1];
    assert!(failed.asset_address.is_none());
    assert!(failed.error.is_some());
    assert_eq!(
        p.store.get_post("p2").await.unwrap().unwrap().mint_status,
        MintStatus::Failed
    );

    // No automatic retry in the same drain; a failed post can be queued again.
    assert!(p.mints.tasks().is_empty());
    p.minter.set_failing(false);
    p.mints.enqueue(scored("p2", 1_500, &p.clock)).await.unwrap();
}

#[tokio::test]
async fn drain_stops_when_mint_budget_runs_out() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(MemoryStore::new());
    let social = Arc::new(SimulatedPlatform::new());
    let budget = Arc::new(
        BudgetTracker::new(shared.clone())
            .with_policy(endpoints::MINTING, BudgetPolicy::window(2, Duration::from_secs(86_400), 0.0)),
    );
    let notifier = Arc::new(NotificationQueue::new(social, budget.clone(), shared.clone(), SITE, 3));
    let mints = MintQueue::new(
        store,
        Arc::new(SimulatedMinter::new()),
        Arc::new(StaticUriPublisher::new(METADATA)),
        notifier,
        budget,
        shared,
        SITE,
    );

    for id in ["a", "b", "c"] {
        mints.enqueue(scored(id, 1_500, &clock)).await.unwrap();
    }
    let results = mints.drain().await;
    assert_eq!(results.len(), 2);
    assert_eq!(mints.pending_count(), 1);

    clock.advance(chrono::Duration::hours(24));
    let results = mints.drain().await;
    assert_eq!(results[0].post_id, "c");
}

// ============================================================
// NotificationQueue
// ============================================================

#[tokio::test]
async fn failed_send_is_retried_before_newer_tasks() {
    let p = pipeline(BudgetPolicy::permissive());
    p.social.fail_sends_to("A", 1);
    p.notifier.enqueue("A", "asset-a", NotificationKind::Minted(Tier::Rising)).await;
    p.notifier.enqueue("B", "asset-b", NotificationKind::Minted(Tier::Rising)).await;

    assert_eq!(p.notifier.drain().await, 1);
    let pending = p.notifier.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].author_id, "A");
    assert_eq!(pending[0].attempts, 1);

    p.notifier.enqueue("C", "asset-c", NotificationKind::Minted(Tier::Viral)).await;
    assert_eq!(p.notifier.drain().await, 2);

    let order: Vec<String> = p.social.sent_messages().into_iter().map(|(user, _)| user).collect();
    assert_eq!(order, vec!["B", "A", "C"]);
}

#[tokio::test]
async fn exhausted_message_budget_leaves_queue_untouched() {
    let p = pipeline(BudgetPolicy::cooldown(Duration::from_secs(15 * 60)));
    p.notifier.enqueue("A", "asset-a", NotificationKind::Minted(Tier::Rising)).await;
    p.notifier.enqueue("B", "asset-b", NotificationKind::Minted(Tier::Rising)).await;

    // One send per cooldown.
    assert_eq!(p.notifier.drain().await, 1);
    p.notifier.enqueue("C", "asset-c", NotificationKind::Minted(Tier::Rising)).await;
    let before = p.notifier.pending();
    assert_eq!(p.notifier.drain().await, 0);
    assert_eq!(p.notifier.pending(), before);

    p.clock.advance(chrono::Duration::minutes(15));
    assert_eq!(p.notifier.drain().await, 1);
    assert_eq!(p.social.sent_messages()[1].0, "B");
}

#[tokio::test]
async fn repeated_failures_go_to_dead_letters() {
    let p = pipeline(BudgetPolicy::permissive());
    p.social.fail_sends_to("A", 10);
    p.notifier.enqueue("A", "asset-a", NotificationKind::Minted(Tier::Rising)).await;

    for _ in 0..3 {
        p.notifier.drain().await;
    }
    assert!(p.notifier.pending().is_empty());
    assert_eq!(p.notifier.dead_letters().len(), 1);
    assert_eq!(p.notifier.status().dead_letters, 1);
}

// ============================================================
// Re-tiering sweep
// ============================================================

#[tokio::test]
async fn sweep_tiers_never_decrease() {
    let p = pipeline(BudgetPolicy::permissive());
    p.social.insert_post(raw("p1", 1_200, &p.clock));
    p.mints.enqueue(scored("p1", 1_200, &p.clock)).await.unwrap();
    p.mints.drain().await;

    let mut observed = Vec::new();
    for likes in [1_200, 3_000, 100, 6_000, 50] {
        p.social.set_metrics("p1", EngagementMetrics::new(likes, 0, 0, 0));
        p.sweep.run().await.unwrap();
        observed.push(p.store.get_post("p1").await.unwrap().unwrap().tier);
        p.clock.advance(chrono::Duration::hours(1));
    }

    assert_eq!(
        observed,
        vec![Tier::Rising, Tier::Trending, Tier::Trending, Tier::Viral, Tier::Viral]
    );
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    // Upgrades from 1 to 2 and from 2 to 3 each asked the program once.
    assert_eq!(p.minter.upgrade_checks().len(), 2);
}

#[tokio::test]
async fn upgrade_notification_links_to_asset_page() {
    let p = pipeline(BudgetPolicy::permissive());
    p.social.insert_post(raw("p1", 1_200, &p.clock));
    p.mints.enqueue(scored("p1", 1_200, &p.clock)).await.unwrap();
    let minted = p.mints.drain().await;
    let asset = minted[0].asset_address.clone().unwrap();

    // First notification: claim page.
    assert_eq!(p.notifier.drain().await, 1);
    assert!(p.social.sent_messages()[0].1.contains(&format!("{SITE}/claim/{asset}")));

    p.social.set_metrics("p1", EngagementMetrics::new(6_000, 0, 0, 0));
    let report = p.sweep.run().await.unwrap();
    assert_eq!(report.upgrades.len(), 1);

    let record = p.store.get_post("p1").await.unwrap().unwrap();
    assert_eq!(record.metadata_uri.as_deref(), Some("https://metadata.solspace.app/p1/tier3"));

    assert_eq!(p.notifier.drain().await, 1);
    let text = &p.social.sent_messages()[1].1;
    assert!(text.contains("Your Rising post has been upgraded to Viral!"));
    assert!(text.contains(&format!("{SITE}/nft/{asset}")));
}

#[tokio::test]
async fn sweep_pauses_when_lookup_budget_is_spent() {
    let p = pipeline(BudgetPolicy::permissive());
    for id in ["a", "b"] {
        p.social.insert_post(raw(id, 1_200, &p.clock));
        p.mints.enqueue(scored(id, 1_200, &p.clock)).await.unwrap();
    }
    p.mints.drain().await;

    p.budget.record_usage(endpoints::LOOKUP, 999);
    let report = p.sweep.run().await.unwrap();
    assert_eq!(report.checked, 1);
    assert!(report.budget_exhausted);
}

// ============================================================
// Detector
// ============================================================

#[tokio::test]
async fn detector_serves_cache_when_budget_or_upstream_fails() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let social = Arc::new(SimulatedPlatform::with_posts(vec![
        raw("hot", 6_000, &clock),
        raw("meh", 20, &clock),
    ]));
    let budget = Arc::new(
        BudgetTracker::new(shared.clone())
            .with_policy(endpoints::SEARCH, BudgetPolicy::cooldown(Duration::from_secs(15 * 60))),
    );
    let detector = FullAccessDetector::new(SearchCore::new(
        social.clone(),
        budget,
        shared,
        full_access::default_queries(),
        TierThresholds::standard(),
        100,
    ));

    let first = detector.poll().await;
    assert_eq!(first.status, PollStatus::Ok);
    assert_eq!(first.posts.len(), 1);
    assert_eq!(first.posts[0].id(), "hot");
    // The cooldown paid for one of the four topic queries.
    assert_eq!(social.search_calls(), 1);

    let second = detector.poll().await;
    assert!(matches!(second.status, PollStatus::BudgetExhausted { .. }));
    assert_eq!(second.status.describe(), "resuming in 15m");
    assert_eq!(second.posts, detector.queued_posts());

    clock.advance(chrono::Duration::minutes(15));
    social.set_search_failing(true);
    let third = detector.poll().await;
    assert!(matches!(third.status, PollStatus::UpstreamError(_)));
    assert_eq!(third.posts.len(), 1);

    detector.stop();
    detector.stop();
}
