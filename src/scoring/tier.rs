// Tier classification.
//
// A post qualifies for a tier if it has enough absolute likes OR enough
// like velocity (likes per hour of age). Tiers are checked from highest to
// lowest so a post lands in the best tier it qualifies for.
//
// Thresholds are injected per profile: the conservative profile uses
// higher bars so fewer posts reach the (expensive) mint step.

use serde::{Deserialize, Serialize};

use crate::social::EngagementMetrics;

/// Discrete popularity tier. Ordering follows virality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    NotViral,
    Rising,
    Trending,
    Viral,
}

impl Tier {
    pub const MAX: Tier = Tier::Viral;

    pub fn as_u8(&self) -> u8 {
        match self {
            Tier::NotViral => 0,
            Tier::Rising => 1,
            Tier::Trending => 2,
            Tier::Viral => 3,
        }
    }

    /// Out-of-range values clamp to the nearest tier.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Tier::NotViral,
            1 => Tier::Rising,
            2 => Tier::Trending,
            _ => Tier::Viral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::NotViral => "Not viral",
            Tier::Rising => "Rising",
            Tier::Trending => "Trending",
            Tier::Viral => "Viral",
        }
    }

    pub fn is_viral(&self) -> bool {
        *self > Tier::NotViral
    }

    pub fn is_max(&self) -> bool {
        *self == Tier::MAX
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bar for a single tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub min_likes: u64,
    /// Likes per hour.
    pub min_velocity: f64,
}

impl TierThreshold {
    pub const fn new(min_likes: u64, min_velocity: f64) -> Self {
        Self {
            min_likes,
            min_velocity,
        }
    }

    fn qualifies(&self, likes: u64, velocity: f64) -> bool {
        likes >= self.min_likes || velocity >= self.min_velocity
    }
}

/// Thresholds for tiers 1 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub rising: TierThreshold,
    pub trending: TierThreshold,
    pub viral: TierThreshold,
}

impl TierThresholds {
    /// Full-access (and lightweight) defaults.
    pub const fn standard() -> Self {
        Self {
            rising: TierThreshold::new(1_000, 100.0),
            trending: TierThreshold::new(2_500, 250.0),
            viral: TierThreshold::new(5_000, 500.0),
        }
    }

    /// Higher bars for the budget-constrained profile.
    pub const fn conservative() -> Self {
        Self {
            rising: TierThreshold::new(2_500, 250.0),
            trending: TierThreshold::new(5_000, 500.0),
            viral: TierThreshold::new(7_500, 750.0),
        }
    }

    pub fn for_tier(&self, tier: Tier) -> Option<&TierThreshold> {
        match tier {
            Tier::NotViral => None,
            Tier::Rising => Some(&self.rising),
            Tier::Trending => Some(&self.trending),
            Tier::Viral => Some(&self.viral),
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify a post given its metrics and age in hours.
///
/// `age_hours` below 1.0 (or non-finite) is treated as 1.0.
pub fn compute_tier(metrics: &EngagementMetrics, age_hours: f64, thresholds: &TierThresholds) -> Tier {
    let age = super::normalize_age(age_hours);
    let velocity = metrics.likes as f64 / age;

    for tier in [Tier::Viral, Tier::Trending, Tier::Rising] {
        if let Some(threshold) = thresholds.for_tier(tier) {
            if threshold.qualifies(metrics.likes, velocity) {
                return tier;
            }
        }
    }
    Tier::NotViral
}

#[cfg(test)]
mod tests {
    use super::*;

    fn likes(n: u64) -> EngagementMetrics {
        EngagementMetrics::new(n, 0, 0, 0)
    }

    #[test]
    fn test_absolute_likes_reach_top_tier() {
        let t = TierThresholds::standard();
        assert_eq!(compute_tier(&likes(5_000), 48.0, &t), Tier::Viral);
        assert_eq!(compute_tier(&likes(4_999), 48.0, &t), Tier::Trending);
    }

    #[test]
    fn test_velocity_alone_qualifies() {
        let t = TierThresholds::standard();
        // 600 likes in one hour: velocity 600 >= 500
        assert_eq!(compute_tier(&likes(600), 1.0, &t), Tier::Viral);
        // Same likes over 6h: velocity 100 -> Rising
        assert_eq!(compute_tier(&likes(600), 6.0, &t), Tier::Rising);
    }

    #[test]
    fn test_young_post_age_floored_at_one_hour() {
        let t = TierThresholds::standard();
        // At age 0.01h the raw velocity would be 20,000/h. Floored at 1h
        // it is 200/h which is only Rising.
        assert_eq!(compute_tier(&likes(200), 0.01, &t), Tier::Rising);
        assert_eq!(compute_tier(&likes(200), 0.0, &t), Tier::Rising);
    }

    #[test]
    fn test_conservative_is_stricter() {
        let m = likes(5_000);
        assert_eq!(compute_tier(&m, 48.0, &TierThresholds::standard()), Tier::Viral);
        assert_eq!(compute_tier(&m, 48.0, &TierThresholds::conservative()), Tier::Trending);
    }

    #[test]
    fn test_zero_likes_not_viral() {
        assert_eq!(
            compute_tier(&likes(0), 3.0, &TierThresholds::standard()),
            Tier::NotViral
        );
    }

    #[test]
    fn test_tier_u8_round_trip_and_clamp() {
        for t in [Tier::NotViral, Tier::Rising, Tier::Trending, Tier::Viral] {
            assert_eq!(Tier::from_u8(t.as_u8()), t);
        }
        assert_eq!(Tier::from_u8(9), Tier::Viral);
    }
}
