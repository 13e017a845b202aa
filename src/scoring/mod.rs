// Scoring engine: pure functions, no I/O.
//
// Turns raw engagement into a viral score (1-100) and a tier (0-3).
// Nothing here returns an error: bad numeric input is clamped.

pub mod tier;
pub mod viral;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::social::RawPost;

pub use tier::{compute_tier, Tier, TierThreshold, TierThresholds};
pub use viral::compute_viral_score;

/// Ages below one hour (including negative ages from clock skew) count as
/// one hour so velocity doesn't blow up for brand-new posts.
pub(crate) fn normalize_age(age_hours: f64) -> f64 {
    if age_hours.is_finite() {
        age_hours.max(1.0)
    } else {
        1.0
    }
}

/// Post age in hours at `now`, floored at one hour.
pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = (now - created_at).num_seconds() as f64;
    normalize_age(secs / 3600.0)
}

/// A RawPost with its score and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPost {
    pub post: RawPost,
    pub viral_score: u8,
    pub tier: Tier,
}

impl ScoredPost {
    pub fn id(&self) -> &str {
        &self.post.id
    }

    /// Keep the higher of the two tiers. Tracked posts never downgrade.
    pub fn raise_tier(&mut self, tier: Tier) -> bool {
        if tier > self.tier {
            self.tier = tier;
            true
        } else {
            false
        }
    }
}

/// Score and classify a post as of `now`.
pub fn score_post(post: RawPost, now: DateTime<Utc>, thresholds: &TierThresholds) -> ScoredPost {
    let age = age_hours(post.created_at, now);
    let viral_score = compute_viral_score(&post.metrics, age);
    let tier = compute_tier(&post.metrics, age, thresholds);
    ScoredPost {
        post,
        viral_score,
        tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::EngagementMetrics;
    use chrono::Duration;

    fn post_at(created_at: DateTime<Utc>, likes: u64) -> RawPost {
        RawPost {
            id: "p1".to_string(),
            author_id: "a1".to_string(),
            author_handle: "@a".to_string(),
            text: "hello".to_string(),
            created_at,
            metrics: EngagementMetrics::new(likes, 0, 0, 0),
        }
    }

    #[test]
    fn test_age_hours_floors_future_and_fresh_posts() {
        let now = Utc::now();
        assert_eq!(age_hours(now, now), 1.0);
        assert_eq!(age_hours(now + Duration::hours(3), now), 1.0);
        assert!((age_hours(now - Duration::hours(5), now) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_score_post_combines_score_and_tier() {
        let now = Utc::now();
        let scored = score_post(post_at(now - Duration::hours(2), 5_000), now, &TierThresholds::standard());
        assert_eq!(scored.tier, Tier::Viral);
        assert!(scored.viral_score >= 40);
    }

    #[test]
    fn test_raise_tier_never_downgrades() {
        let now = Utc::now();
        let mut scored = score_post(post_at(now, 3_000), now, &TierThresholds::standard());
        assert_eq!(scored.tier, Tier::Viral); // 3000/h velocity
        assert!(!scored.raise_tier(Tier::Rising));
        assert_eq!(scored.tier, Tier::Viral);
    }
}
