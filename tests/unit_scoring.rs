// Unit tests for tiering and the viral score.
//
// Tests isolated pure functions: compute_tier boundary conditions under both
// threshold sets, compute_viral_score bounds and edge cases, and score_post
// age handling.

use chrono::{Duration, TimeZone, Utc};
use viralmint::scoring::{compute_tier, compute_viral_score, score_post, Tier, TierThresholds};
use viralmint::social::{EngagementMetrics, RawPost};

fn likes(n: u64) -> EngagementMetrics {
    EngagementMetrics::new(n, 0, 0, 0)
}

// ============================================================
// compute_tier: boundary conditions
// ============================================================

#[test]
fn tier_exact_boundary_viral() {
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(5_000), 24.0, &t), Tier::Viral);
}

#[test]
fn tier_just_below_viral() {
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(4_999), 24.0, &t), Tier::Trending);
}

#[test]
fn tier_exact_boundary_rising() {
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(1_000), 24.0, &t), Tier::Rising);
}

#[test]
fn tier_below_everything() {
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(999), 24.0, &t), Tier::NotViral);
}

#[test]
fn tier_velocity_alone_qualifies() {
    // 600 likes in one hour: below every like bar, above tier 3 velocity
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(600), 1.0, &t), Tier::Viral);
    assert_eq!(compute_tier(&likes(600), 2.0, &t), Tier::Trending);
}

#[test]
fn tier_conservative_needs_more() {
    let standard = TierThresholds::standard();
    let conservative = TierThresholds::conservative();
    let m = likes(5_000);
    assert_eq!(compute_tier(&m, 48.0, &standard), Tier::Viral);
    assert_eq!(compute_tier(&m, 48.0, &conservative), Tier::Trending);
    assert_eq!(compute_tier(&likes(2_000), 48.0, &conservative), Tier::NotViral);
}

#[test]
fn tier_zero_age_counts_as_one_hour() {
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&likes(150), 0.0, &t), Tier::Rising);
    assert_eq!(compute_tier(&likes(150), f64::NAN, &t), Tier::Rising);
}

#[test]
fn tier_names() {
    assert_eq!(Tier::Rising.as_str(), "Rising");
    assert_eq!(Tier::Trending.as_str(), "Trending");
    assert_eq!(Tier::Viral.as_str(), "Viral");
    assert_eq!(Tier::from_u8(9), Tier::Viral);
}

// ============================================================
// compute_viral_score
// ============================================================

#[test]
fn score_high_velocity_example() {
    let m = EngagementMetrics::new(5_000, 1_000, 500, 0);
    let t = TierThresholds::standard();
    assert_eq!(compute_tier(&m, 2.0, &t), Tier::Viral);
    let score = compute_viral_score(&m, 2.0);
    assert!((40..=100).contains(&score), "score {score} out of range");
}

#[test]
fn score_zero_likes_floors_at_one() {
    assert_eq!(compute_viral_score(&EngagementMetrics::default(), 1.0), 1);
}

#[test]
fn score_stays_in_bounds() {
    let counts = [0u64, 1, 10, 999, 50_000, u64::MAX / 4];
    let ages = [0.0, 0.5, 1.0, 7.0, 24.0, 500.0];
    for &l in &counts {
        for &r in &counts {
            for &age in &ages {
                let score = compute_viral_score(&EngagementMetrics::new(l, r, r, 0), age);
                assert!((1..=100).contains(&score), "likes={l} reshares={r} age={age} -> {score}");
            }
        }
    }
}

#[test]
fn score_reshares_raise_score() {
    let plain = compute_viral_score(&EngagementMetrics::new(300, 0, 0, 0), 6.0);
    let shared = compute_viral_score(&EngagementMetrics::new(300, 300, 0, 0), 6.0);
    assert!(shared > plain);
}

#[test]
fn score_recency_decays() {
    let m = EngagementMetrics::new(2_400, 0, 0, 0);
    // Same velocity (100/h) at both ages, only the recency bonus differs.
    let fresh = compute_viral_score(&m, 24.0);
    let older = compute_viral_score(&EngagementMetrics::new(4_800, 0, 0, 0), 48.0);
    assert_eq!(fresh, older);
    assert!(compute_viral_score(&likes(100), 1.0) > compute_viral_score(&likes(2_400), 24.0));
}

// ============================================================
// score_post
// ============================================================

#[test]
fn score_post_uses_age_from_clock() {
    let now = Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap();
    let post = RawPost {
        id: "p".to_string(),
        author_id: "a".to_string(),
        author_handle: "@a".to_string(),
        text: "hello".to_string(),
        created_at: now - Duration::hours(10),
        metrics: likes(2_000),
    };
    let scored = score_post(post.clone(), now, &TierThresholds::standard());
    // 200 likes/h beats the tier 1 velocity bar, 2000 likes the tier 1 like bar
    assert_eq!(scored.tier, Tier::Rising);
    assert_eq!(scored.id(), "p");

    // Created in the future (clock skew) is treated as one hour old.
    let skewed = RawPost {
        created_at: now + Duration::hours(3),
        ..post
    };
    let scored = score_post(skewed, now, &TierThresholds::standard());
    assert_eq!(scored.tier, Tier::Viral);
}
