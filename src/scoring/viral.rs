// Viral score formula.
//
// score = velocity * reshare_factor * reply_factor * recency / 10
//
// - velocity: likes per hour of age
// - reshare_factor: 1 + 0.5 * reshares / max(1, likes)
// - reply_factor: 1 + 0.3 * replies / max(1, likes)
// - recency: 2.0 for a brand-new post, decaying linearly to 1.0 at 24h
//
// Clamped to 1..=100. The floor is 1, not 0, so "scored but trivial" is
// distinguishable from "never scored".

use crate::social::EngagementMetrics;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 100;

/// Weights for the quality factors.
const RESHARE_WEIGHT: f64 = 0.5;
const REPLY_WEIGHT: f64 = 0.3;

/// Age at which the recency bonus has fully decayed.
const RECENCY_HORIZON_HOURS: f64 = 24.0;

pub fn compute_viral_score(metrics: &EngagementMetrics, age_hours: f64) -> u8 {
    let age = super::normalize_age(age_hours);
    let likes = metrics.likes as f64;
    let denom = likes.max(1.0);

    let velocity = likes / age;
    let reshare_factor = 1.0 + RESHARE_WEIGHT * (metrics.reshares as f64 / denom);
    let reply_factor = 1.0 + REPLY_WEIGHT * (metrics.replies as f64 / denom);
    let recency = recency_bonus(age);

    let raw = velocity * reshare_factor * reply_factor * recency / 10.0;
    if !raw.is_finite() {
        return if raw > 0.0 { MAX_SCORE } else { MIN_SCORE };
    }
    raw.round().clamp(MIN_SCORE as f64, MAX_SCORE as f64) as u8
}

/// 2.0 at age 0, 1.0 at 24h and beyond.
pub fn recency_bonus(age_hours: f64) -> f64 {
    (2.0 - age_hours / RECENCY_HORIZON_HOURS).clamp(1.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_velocity_post_caps_at_100() {
        let m = EngagementMetrics::new(5_000, 1_000, 500, 0);
        // 2500/h * 1.1 * 1.03 * (2 - 2/24) / 10 ~= 543 -> clamped
        assert_eq!(compute_viral_score(&m, 2.0), 100);
    }

    #[test]
    fn test_moderate_post() {
        let m = EngagementMetrics::new(240, 0, 0, 0);
        // 240/24h = 10/h, no factors, recency 1.0 -> 1.0
        assert_eq!(compute_viral_score(&m, 24.0), 1);
        // 240 likes in 1h: 240 * (2 - 1/24) / 10 = 47.0
        assert_eq!(compute_viral_score(&m, 1.0), 47);
    }

    #[test]
    fn test_zero_likes_floors_at_one() {
        let m = EngagementMetrics::new(0, 50, 50, 0);
        assert_eq!(compute_viral_score(&m, 5.0), 1);
    }

    #[test]
    fn test_zero_age_treated_as_one_hour() {
        let m = EngagementMetrics::new(100, 0, 0, 0);
        assert_eq!(compute_viral_score(&m, 0.0), compute_viral_score(&m, 1.0));
    }

    #[test]
    fn test_recency_bonus_decays_linearly() {
        assert!((recency_bonus(0.0) - 2.0).abs() < 1e-9);
        assert!((recency_bonus(12.0) - 1.5).abs() < 1e-9);
        assert!((recency_bonus(24.0) - 1.0).abs() < 1e-9);
        assert!((recency_bonus(100.0) - 1.0).abs() < 1e-9);
    }
}
