use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Visitor context ────────────────────────────────────────────────────────

/// Everything the classifiers know about a visitor, captured by the caller
/// rather than read from ambient browser state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisitorContext {
    pub visitor_id: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub screen: Viewport,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

// ─── Segments ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficCategory {
    Direct,
    Organic,
    Social,
    Paid,
    Email,
    Referral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSource {
    pub category: TrafficCategory,
    pub subcategory: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaType {
    MobileContentCreator,
    YoutubeCreator,
    ProfessionalCreator,
    GeneralUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorPersona {
    #[serde(rename = "type")]
    pub persona_type: PersonaType,
    pub platform: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub category: DeviceCategory,
    pub os: String,
    pub browser: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub timezone: String,
    pub estimated_region: String,
}

/// Classification of one visitor, upserted by `visitor_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorSegment {
    pub visitor_id: String,
    pub traffic_source: TrafficSource,
    pub creator_persona: CreatorPersona,
    pub device_category: DeviceInfo,
    pub geo: GeoInfo,
    pub classified_at: DateTime<Utc>,
}

// ─── Behavior & scores ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub visitor_id: String,
    #[serde(default)]
    pub page_views: u32,
    #[serde(default)]
    pub time_on_site_ms: u64,
    #[serde(default)]
    pub max_scroll_depth_pct: f64,
    #[serde(default)]
    pub form_interactions: u32,
    #[serde(default)]
    pub video_watched: bool,
    #[serde(default)]
    pub downloaded_asset: bool,
    #[serde(default)]
    pub social_shares: u32,
    #[serde(default)]
    pub return_visitor: bool,
}

impl BehaviorProfile {
    pub fn new(visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            ..Default::default()
        }
    }

    /// Fold one interaction into the running counters.
    pub fn apply(&mut self, signal: &BehaviorSignal) {
        match *signal {
            BehaviorSignal::PageView => self.page_views = self.page_views.saturating_add(1),
            BehaviorSignal::TimeOnSite { ms } => {
                self.time_on_site_ms = self.time_on_site_ms.saturating_add(ms)
            }
            BehaviorSignal::Scroll { depth_pct } => {
                let depth = depth_pct.clamp(0.0, 100.0);
                self.max_scroll_depth_pct = self.max_scroll_depth_pct.max(depth);
            }
            BehaviorSignal::FormInteraction => {
                self.form_interactions = self.form_interactions.saturating_add(1)
            }
            BehaviorSignal::VideoWatched => self.video_watched = true,
            BehaviorSignal::AssetDownloaded => self.downloaded_asset = true,
            BehaviorSignal::SocialShare => self.social_shares = self.social_shares.saturating_add(1),
            BehaviorSignal::ReturnVisit => self.return_visitor = true,
        }
    }
}

/// A single visitor interaction that mutates a [`BehaviorProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSignal {
    PageView,
    TimeOnSite { ms: u64 },
    Scroll { depth_pct: f64 },
    FormInteraction,
    VideoWatched,
    AssetDownloaded,
    SocialShare,
    ReturnVisit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreProfile {
    pub visitor_id: String,
    pub lead_score: u8,
    pub conversion_probability: f64,
    pub predicted_ltv: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub churn_risk: Option<u8>,
    pub last_updated: DateTime<Utc>,
}

/// Trial-account usage used by the churn model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialEngagement {
    pub trial_start: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub feature_usage_count: u32,
    /// Sessions per day since the trial started.
    #[serde(default)]
    pub session_frequency: f64,
    #[serde(default)]
    pub has_created_content: bool,
    #[serde(default)]
    pub support_tickets: u32,
    #[serde(default)]
    pub has_invited_team_members: bool,
    #[serde(default)]
    pub has_customized_settings: bool,
    #[serde(default)]
    pub exported_content: bool,
}

// ─── Metrics & alerts ───────────────────────────────────────────────────────

/// Raw counters as returned by the external metrics source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCounters {
    pub visitors: u64,
    pub conversions: u64,
    pub revenue: f64,
    pub sessions: u64,
    pub bounced_sessions: u64,
    pub total_session_duration_secs: f64,
    pub total_scroll_depth_pct: f64,
    pub page_loads: u64,
    pub total_page_load_ms: f64,
    pub active_tests: u32,
    pub significant_tests: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub id: Uuid,
    pub visitors: u64,
    pub conversions: u64,
    pub conversion_rate: f64,
    pub revenue: f64,
    pub revenue_per_visitor: f64,
    pub page_load_time_ms: f64,
    pub bounce_rate: f64,
    pub session_duration_secs: f64,
    pub scroll_depth_pct: f64,
    pub engagement_score: f64,
    pub active_tests: u32,
    pub significant_tests: u32,
    pub captured_at: DateTime<Utc>,
}

/// Snapshot field an alert rule observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMetric {
    Visitors,
    Conversions,
    ConversionRate,
    Revenue,
    RevenuePerVisitor,
    PageLoadTimeMs,
    BounceRate,
    SessionDurationSecs,
    ScrollDepthPct,
    EngagementScore,
    ActiveTests,
    SignificantTests,
}

impl MetricsSnapshot {
    pub fn metric(&self, metric: SnapshotMetric) -> f64 {
        match metric {
            SnapshotMetric::Visitors => self.visitors as f64,
            SnapshotMetric::Conversions => self.conversions as f64,
            SnapshotMetric::ConversionRate => self.conversion_rate,
            SnapshotMetric::Revenue => self.revenue,
            SnapshotMetric::RevenuePerVisitor => self.revenue_per_visitor,
            SnapshotMetric::PageLoadTimeMs => self.page_load_time_ms,
            SnapshotMetric::BounceRate => self.bounce_rate,
            SnapshotMetric::SessionDurationSecs => self.session_duration_secs,
            SnapshotMetric::ScrollDepthPct => self.scroll_depth_pct,
            SnapshotMetric::EngagementScore => self.engagement_score,
            SnapshotMetric::ActiveTests => self.active_tests as f64,
            SnapshotMetric::SignificantTests => self.significant_tests as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Below,
    Above,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Id of the rule that raised the alert.
    pub id: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
    pub snapshot_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behavior_counters_saturate() {
        let mut behavior = BehaviorProfile::new("v1");
        behavior.apply(&BehaviorSignal::TimeOnSite { ms: u64::MAX });
        behavior.apply(&BehaviorSignal::TimeOnSite { ms: u64::MAX });
        behavior.apply(&BehaviorSignal::TimeOnSite { ms: 1 });
        assert_eq!(behavior.time_on_site_ms, u64::MAX);

        behavior.page_views = u32::MAX;
        behavior.form_interactions = u32::MAX;
        behavior.social_shares = u32::MAX;
        behavior.apply(&BehaviorSignal::PageView);
        behavior.apply(&BehaviorSignal::FormInteraction);
        behavior.apply(&BehaviorSignal::SocialShare);
        assert_eq!(behavior.page_views, u32::MAX);
        assert_eq!(behavior.form_interactions, u32::MAX);
        assert_eq!(behavior.social_shares, u32::MAX);
    }

    #[test]
    fn test_scroll_keeps_clamped_maximum() {
        let mut behavior = BehaviorProfile::new("v1");
        behavior.apply(&BehaviorSignal::Scroll { depth_pct: 60.0 });
        behavior.apply(&BehaviorSignal::Scroll { depth_pct: 20.0 });
        assert_eq!(behavior.max_scroll_depth_pct, 60.0);
        behavior.apply(&BehaviorSignal::Scroll { depth_pct: 140.0 });
        assert_eq!(behavior.max_scroll_depth_pct, 100.0);
    }
}
