//! Engagement features derived from a [`BehaviorProfile`].

use hooklab_core::types::BehaviorProfile;
use serde::{Deserialize, Serialize};

/// Inputs to the lifetime-value multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementSignals {
    /// 0–10 blend of depth and breadth of interaction.
    pub engagement_score: f64,
    /// Fraction (0–1) of the feature signals the visitor has touched.
    pub feature_adoption: f64,
    pub social_sharing: bool,
}

impl EngagementSignals {
    pub fn from_behavior(behavior: &BehaviorProfile) -> Self {
        let minutes = behavior.time_on_site_ms as f64 / 60_000.0;
        let score = behavior.page_views as f64 * 0.5
            + minutes * 0.5
            + behavior.max_scroll_depth_pct / 100.0 * 2.0
            + behavior.form_interactions as f64
            + if behavior.video_watched { 1.0 } else { 0.0 }
            + if behavior.downloaded_asset { 1.5 } else { 0.0 }
            + if behavior.return_visitor { 1.0 } else { 0.0 };

        let features = [
            behavior.form_interactions > 0,
            behavior.video_watched,
            behavior.downloaded_asset,
            behavior.social_shares > 0,
            behavior.return_visitor,
        ];
        let adopted = features.iter().filter(|f| **f).count();

        Self {
            engagement_score: score.clamp(0.0, 10.0),
            feature_adoption: adopted as f64 / features.len() as f64,
            social_sharing: behavior.social_shares > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile() {
        let signals = EngagementSignals::from_behavior(&BehaviorProfile::new("v1"));
        assert_eq!(signals.engagement_score, 0.0);
        assert_eq!(signals.feature_adoption, 0.0);
        assert!(!signals.social_sharing);
    }

    #[test]
    fn test_capped_at_ten() {
        let behavior = BehaviorProfile {
            visitor_id: "v1".into(),
            page_views: 40,
            time_on_site_ms: 3_600_000,
            max_scroll_depth_pct: 100.0,
            form_interactions: 3,
            video_watched: true,
            downloaded_asset: true,
            social_shares: 2,
            return_visitor: true,
        };
        let signals = EngagementSignals::from_behavior(&behavior);
        assert_eq!(signals.engagement_score, 10.0);
        assert_eq!(signals.feature_adoption, 1.0);
        assert!(signals.social_sharing);
    }
}
