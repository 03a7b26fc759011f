//! Trial churn risk.

use chrono::{DateTime, Utc};
use hooklab_core::config::ChurnWeights;
use hooklab_core::types::TrialEngagement;

/// Additive churn risk in `[0, 100]`: risk factors add points, protective
/// behaviors remove them.
pub fn churn_risk(engagement: &TrialEngagement, weights: &ChurnWeights, now: DateTime<Utc>) -> u8 {
    let days_since_trial = (now - engagement.trial_start).num_days();
    let last_activity_days = (now - engagement.last_activity_at).num_days();

    let mut risk: i32 = 0;
    if days_since_trial > weights.dormant_after_trial_days
        && last_activity_days > weights.dormant_inactive_days
    {
        risk += weights.dormant;
    }
    if engagement.feature_usage_count < weights.low_usage_below {
        risk += weights.low_usage;
    }
    if engagement.session_frequency < weights.low_frequency_below {
        risk += weights.low_frequency;
    }
    if !engagement.has_created_content {
        risk += weights.no_content;
    }
    if engagement.support_tickets > weights.support_tickets_above {
        risk += weights.support_burden;
    }

    if engagement.has_invited_team_members {
        risk -= weights.invited_team;
    }
    if engagement.has_customized_settings {
        risk -= weights.customized_settings;
    }
    if engagement.exported_content {
        risk -= weights.exported_content;
    }

    risk.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn engagement(now: DateTime<Utc>) -> TrialEngagement {
        TrialEngagement {
            trial_start: now - Duration::days(2),
            last_activity_at: now,
            feature_usage_count: 5,
            session_frequency: 1.5,
            has_created_content: true,
            support_tickets: 0,
            has_invited_team_members: false,
            has_customized_settings: false,
            exported_content: false,
        }
    }

    #[test]
    fn test_healthy_trial_has_no_risk() {
        let now = Utc::now();
        assert_eq!(churn_risk(&engagement(now), &ChurnWeights::default(), now), 0);
    }

    #[test]
    fn test_dormant_trial_saturates() {
        let now = Utc::now();
        let e = TrialEngagement {
            trial_start: now - Duration::days(10),
            last_activity_at: now - Duration::days(5),
            feature_usage_count: 1,
            session_frequency: 0.2,
            has_created_content: false,
            support_tickets: 3,
            ..engagement(now)
        };
        // 30 + 25 + 20 + 35 + 15 = 125, clamped
        assert_eq!(churn_risk(&e, &ChurnWeights::default(), now), 100);
    }

    #[test]
    fn test_inactivity_needs_both_conditions() {
        let now = Utc::now();
        let early = TrialEngagement {
            trial_start: now - Duration::days(5),
            last_activity_at: now - Duration::days(5),
            ..engagement(now)
        };
        assert_eq!(churn_risk(&early, &ChurnWeights::default(), now), 0);

        let late = TrialEngagement {
            trial_start: now - Duration::days(8),
            last_activity_at: now - Duration::days(4),
            ..engagement(now)
        };
        assert_eq!(churn_risk(&late, &ChurnWeights::default(), now), 30);
    }

    #[test]
    fn test_protective_behaviors() {
        let now = Utc::now();
        let e = TrialEngagement {
            has_created_content: false,
            has_invited_team_members: true,
            has_customized_settings: true,
            ..engagement(now)
        };
        // 35 - 20 - 10
        assert_eq!(churn_risk(&e, &ChurnWeights::default(), now), 5);

        let all = TrialEngagement {
            exported_content: true,
            ..e
        };
        assert_eq!(churn_risk(&all, &ChurnWeights::default(), now), 0);
    }

    #[test]
    fn test_custom_churn_weights() {
        let now = Utc::now();
        let e = TrialEngagement {
            has_created_content: false,
            ..engagement(now)
        };
        let weights = ChurnWeights {
            no_content: 60,
            ..Default::default()
        };
        assert_eq!(churn_risk(&e, &weights, now), 60);
    }
}
