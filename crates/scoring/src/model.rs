//! Lead score, conversion probability and lifetime value.
//!
//! These are heuristics, not trained models: every output is a fixed
//! formula over the behavior profile and segment, parameterised by
//! [`ScoringWeights`].

use chrono::{DateTime, Utc};
use hooklab_core::config::ScoringWeights;
use hooklab_core::types::{BehaviorProfile, ScoreProfile, TrialEngagement, VisitorSegment};

use crate::churn::churn_risk;
use crate::signals::EngagementSignals;

#[derive(Debug, Clone, Default)]
pub struct ScoringModel {
    weights: ScoringWeights,
}

impl ScoringModel {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Weighted behavior points scaled by the traffic-source and persona
    /// multipliers, clamped to `[0, 100]`.
    pub fn lead_score(&self, behavior: &BehaviorProfile, segment: &VisitorSegment) -> u8 {
        let p = &self.weights.lead_points;
        let minutes = behavior.time_on_site_ms as f64 / 60_000.0;
        let points = behavior.page_views as f64 * p.page_view
            + minutes.min(p.max_scored_minutes) * p.minute_on_site
            + behavior.max_scroll_depth_pct / 100.0 * p.full_scroll
            + behavior.form_interactions as f64 * p.form_interaction
            + if behavior.video_watched { p.video_watched } else { 0.0 }
            + if behavior.downloaded_asset { p.asset_downloaded } else { 0.0 }
            + behavior.social_shares as f64 * p.social_share
            + if behavior.return_visitor { p.return_visit } else { 0.0 };

        let scaled = points
            * self
                .weights
                .lead_traffic_multiplier
                .get(segment.traffic_source.category)
            * self
                .weights
                .lead_persona_multiplier
                .get(segment.creator_persona.persona_type);

        scaled.clamp(0.0, 100.0).round() as u8
    }

    /// Logistic conversion model, rounded to two decimals.
    pub fn conversion_probability(
        &self,
        lead_score: u8,
        segment: &VisitorSegment,
        behavior: &BehaviorProfile,
    ) -> f64 {
        let w = &self.weights;
        let mut logit = w.logit_intercept + lead_score as f64 / 100.0 * w.logit_lead_weight;
        logit += w.logit_persona_weight.get(segment.creator_persona.persona_type);
        logit += w.logit_traffic_weight.get(segment.traffic_source.category);

        let bonus = &w.conversion_bonus;
        if behavior.form_interactions > 0 {
            logit += bonus.form_interaction;
        }
        if behavior.video_watched {
            logit += bonus.video_watched;
        }
        if behavior.downloaded_asset {
            logit += bonus.asset_downloaded;
        }
        if behavior.time_on_site_ms > bonus.long_visit_ms {
            logit += bonus.long_visit;
        }

        let probability = 1.0 / (1.0 + (-logit).exp());
        (probability * 100.0).round() / 100.0
    }

    /// Persona base value × conversion probability × engagement multipliers.
    pub fn predicted_ltv(
        &self,
        conversion_probability: f64,
        segment: &VisitorSegment,
        signals: &EngagementSignals,
    ) -> i64 {
        let mut value = self
            .weights
            .ltv_base
            .get(segment.creator_persona.persona_type)
            * conversion_probability.clamp(0.0, 1.0);

        let boost = &self.weights.ltv_boost;
        if signals.engagement_score > boost.engagement_above {
            value *= boost.engagement_multiplier;
        }
        if signals.feature_adoption > boost.adoption_above {
            value *= boost.adoption_multiplier;
        }
        if signals.social_sharing {
            value *= boost.social_sharing_multiplier;
        }

        value.round().max(0.0) as i64
    }

    /// Compute the full score record for a visitor.
    pub fn score(
        &self,
        behavior: &BehaviorProfile,
        segment: &VisitorSegment,
        trial: Option<&TrialEngagement>,
        now: DateTime<Utc>,
    ) -> ScoreProfile {
        let lead_score = self.lead_score(behavior, segment);
        let conversion_probability = self.conversion_probability(lead_score, segment, behavior);
        let signals = EngagementSignals::from_behavior(behavior);

        ScoreProfile {
            visitor_id: behavior.visitor_id.clone(),
            lead_score,
            conversion_probability,
            predicted_ltv: self.predicted_ltv(conversion_probability, segment, &signals),
            churn_risk: trial.map(|t| churn_risk(t, &self.weights.churn, now)),
            last_updated: now,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hooklab_core::types::{
        CreatorPersona, DeviceCategory, DeviceInfo, GeoInfo, PersonaType, TrafficCategory,
        TrafficSource,
    };

    pub(crate) fn segment(category: TrafficCategory, persona: PersonaType) -> VisitorSegment {
        VisitorSegment {
            visitor_id: "v1".into(),
            traffic_source: TrafficSource {
                category,
                subcategory: "test".into(),
                confidence: 1.0,
            },
            creator_persona: CreatorPersona {
                persona_type: persona,
                platform: "desktop".into(),
                confidence: 0.5,
            },
            device_category: DeviceInfo {
                category: DeviceCategory::Desktop,
                os: "macOS".into(),
                browser: "Safari".into(),
            },
            geo: GeoInfo {
                timezone: "UTC".into(),
                estimated_region: "unknown".into(),
            },
            classified_at: Utc::now(),
        }
    }

    pub(crate) fn engaged_behavior() -> BehaviorProfile {
        BehaviorProfile {
            visitor_id: "v1".into(),
            page_views: 5,
            time_on_site_ms: 240_000,
            max_scroll_depth_pct: 80.0,
            form_interactions: 1,
            video_watched: true,
            downloaded_asset: false,
            social_shares: 0,
            return_visitor: true,
        }
    }

    #[test]
    fn test_lead_score_reference_case() {
        let model = ScoringModel::default();
        // 10 + 20 + 8 + 15 + 20 + 15 = 88 points, × 0.9 paid × 1.0 general
        let paid = segment(TrafficCategory::Paid, PersonaType::GeneralUser);
        assert_eq!(model.lead_score(&engaged_behavior(), &paid), 79);

        // 88 × 1.3 direct saturates.
        let direct = segment(TrafficCategory::Direct, PersonaType::GeneralUser);
        assert_eq!(model.lead_score(&engaged_behavior(), &direct), 100);
    }

    #[test]
    fn test_lead_score_caps_minutes() {
        let model = ScoringModel::default();
        let seg = segment(TrafficCategory::Social, PersonaType::GeneralUser);
        let mut behavior = BehaviorProfile::new("v1");
        behavior.time_on_site_ms = 10 * 60_000;
        let ten = model.lead_score(&behavior, &seg);
        behavior.time_on_site_ms = 90 * 60_000;
        assert_eq!(model.lead_score(&behavior, &seg), ten);
        assert_eq!(ten, 50);
    }

    #[test]
    fn test_lead_score_monotonic_in_form_interactions() {
        let model = ScoringModel::default();
        for category in [
            TrafficCategory::Organic,
            TrafficCategory::Paid,
            TrafficCategory::Email,
        ] {
            for persona in [PersonaType::GeneralUser, PersonaType::ProfessionalCreator] {
                let seg = segment(category, persona);
                let mut behavior = BehaviorProfile::new("v1");
                behavior.page_views = 2;
                let mut previous = model.lead_score(&behavior, &seg);
                for forms in 1..10 {
                    behavior.form_interactions = forms;
                    let current = model.lead_score(&behavior, &seg);
                    assert!(current >= previous);
                    previous = current;
                }
            }
        }
    }

    #[test]
    fn test_conversion_probability_reference_cases() {
        let model = ScoringModel::default();
        let paid = segment(TrafficCategory::Paid, PersonaType::GeneralUser);
        // logit = -2 + 2.37 + 0.1 + 1.0 + 0.8 + 0.6 = 2.87
        assert_eq!(
            model.conversion_probability(79, &paid, &engaged_behavior()),
            0.95
        );

        // logit = -2 + 0.6 direct = -1.4
        let direct = segment(TrafficCategory::Direct, PersonaType::GeneralUser);
        assert_eq!(
            model.conversion_probability(0, &direct, &BehaviorProfile::new("v1")),
            0.2
        );
    }

    #[test]
    fn test_conversion_probability_bounds() {
        let model = ScoringModel::default();
        let seg = segment(TrafficCategory::Email, PersonaType::ProfessionalCreator);
        let mut behavior = engaged_behavior();
        behavior.downloaded_asset = true;
        let p = model.conversion_probability(100, &seg, &behavior);
        assert!(p > 0.9 && p <= 1.0);
    }

    #[test]
    fn test_predicted_ltv() {
        let model = ScoringModel::default();
        let seg = segment(TrafficCategory::Paid, PersonaType::GeneralUser);
        let signals = EngagementSignals::from_behavior(&engaged_behavior());
        // engagement 9.1 (> 7), adoption 0.6 (not > 0.6), no sharing
        assert_eq!(model.predicted_ltv(0.95, &seg, &signals), 98);

        let pro = segment(TrafficCategory::Paid, PersonaType::ProfessionalCreator);
        let all = EngagementSignals {
            engagement_score: 9.0,
            feature_adoption: 0.8,
            social_sharing: true,
        };
        // 299 × 0.5 × 1.3 × 1.2 × 1.1 = 256.542
        assert_eq!(model.predicted_ltv(0.5, &pro, &all), 257);
    }

    #[test]
    fn test_predicted_ltv_never_negative() {
        let model = ScoringModel::default();
        let signals = EngagementSignals::from_behavior(&BehaviorProfile::new("v1"));
        for persona in [
            PersonaType::MobileContentCreator,
            PersonaType::YoutubeCreator,
            PersonaType::ProfessionalCreator,
            PersonaType::GeneralUser,
        ] {
            let seg = segment(TrafficCategory::Referral, persona);
            for p in [-0.5, 0.0, 0.01, 0.5, 1.0] {
                assert!(model.predicted_ltv(p, &seg, &signals) >= 0);
            }
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let model = ScoringModel::default();
        let seg = segment(TrafficCategory::Organic, PersonaType::YoutubeCreator);
        let now = Utc::now();
        let a = model.score(&engaged_behavior(), &seg, None, now);
        let b = model.score(&engaged_behavior(), &seg, None, now);
        assert_eq!(a, b);
        assert!(a.churn_risk.is_none());
    }

    #[test]
    fn test_custom_weights() {
        let mut weights = ScoringWeights::default();
        weights.lead_traffic_multiplier.paid = 0.5;
        let model = ScoringModel::new(weights);
        let paid = segment(TrafficCategory::Paid, PersonaType::GeneralUser);
        assert_eq!(model.lead_score(&engaged_behavior(), &paid), 44);

        // 88 - 15 form points, × 0.9 paid
        let mut weights = ScoringWeights::default();
        weights.lead_points.form_interaction = 0.0;
        weights.conversion_bonus.long_visit = 0.0;
        let model = ScoringModel::new(weights);
        assert_eq!(model.lead_score(&engaged_behavior(), &paid), 66);
        // logit = -2 + 1.98 + 0.1 + 1.0 + 0.8 = 1.88
        assert_eq!(
            model.conversion_probability(66, &paid, &engaged_behavior()),
            0.87
        );
    }
}
