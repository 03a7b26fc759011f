use serde::Deserialize;

use crate::error::{HooklabError, HooklabResult};
use crate::types::{AlertSeverity, Comparison, PersonaType, SnapshotMetric, TrafficCategory};

/// Root application configuration. Loaded from environment variables
/// with the prefix `HOOKLAB__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub experiments: ExperimentConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    /// Two-sided confidence level used for significance verdicts.
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_alert_log_capacity")]
    pub alert_log_capacity: usize,
    #[serde(default = "default_alert_rules")]
    pub rules: Vec<AlertRule>,
    /// Pushed counters older than this are treated as unavailable.
    #[serde(default = "default_counters_max_age_secs")]
    pub counters_max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_sink_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

/// Threshold rule evaluated against every metrics snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub metric: SnapshotMetric,
    pub comparison: Comparison,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub message: String,
    /// Rule is only evaluated once the snapshot has at least this many visitors.
    #[serde(default)]
    pub min_visitors: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_confidence_level() -> f64 {
    0.95
}
fn default_interval_secs() -> u64 {
    30
}
fn default_alert_log_capacity() -> usize {
    50
}
fn default_counters_max_age_secs() -> u64 {
    300
}
fn default_queue_capacity() -> usize {
    10_000
}
fn default_sink_batch_size() -> usize {
    500
}
fn default_flush_interval_ms() -> u64 {
    1000
}

pub fn default_alert_rules() -> Vec<AlertRule> {
    let rule = |id: &str, metric, comparison, threshold, severity, message: &str| AlertRule {
        id: id.to_string(),
        metric,
        comparison,
        threshold,
        severity,
        message: message.to_string(),
        min_visitors: 1,
    };
    vec![
        rule(
            "low_conversion_rate",
            SnapshotMetric::ConversionRate,
            Comparison::Below,
            0.02,
            AlertSeverity::Warning,
            "Conversion rate dropped below 2%",
        ),
        rule(
            "high_bounce_rate",
            SnapshotMetric::BounceRate,
            Comparison::Above,
            0.70,
            AlertSeverity::Warning,
            "Bounce rate above 70%",
        ),
        rule(
            "slow_page_load",
            SnapshotMetric::PageLoadTimeMs,
            Comparison::Above,
            3000.0,
            AlertSeverity::Critical,
            "Average page load slower than 3s",
        ),
        rule(
            "low_engagement",
            SnapshotMetric::EngagementScore,
            Comparison::Below,
            3.0,
            AlertSeverity::Warning,
            "Engagement score below 3/10",
        ),
        rule(
            "low_revenue_per_visitor",
            SnapshotMetric::RevenuePerVisitor,
            Comparison::Below,
            0.10,
            AlertSeverity::Warning,
            "Revenue per visitor below 0.10",
        ),
    ]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            confidence_level: default_confidence_level(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            alert_log_capacity: default_alert_log_capacity(),
            rules: default_alert_rules(),
            counters_max_age_secs: default_counters_max_age_secs(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            batch_size: default_sink_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            experiments: ExperimentConfig::default(),
            aggregator: AggregatorConfig::default(),
            sink: SinkConfig::default(),
            scoring: ScoringWeights::default(),
        }
    }
}

// ─── Scoring weights ────────────────────────────────────────────────────

/// Per-traffic-source coefficient table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrafficTable {
    pub organic: f64,
    pub social: f64,
    pub paid: f64,
    pub referral: f64,
    pub direct: f64,
    pub email: f64,
}

impl TrafficTable {
    pub fn get(&self, category: TrafficCategory) -> f64 {
        match category {
            TrafficCategory::Organic => self.organic,
            TrafficCategory::Social => self.social,
            TrafficCategory::Paid => self.paid,
            TrafficCategory::Referral => self.referral,
            TrafficCategory::Direct => self.direct,
            TrafficCategory::Email => self.email,
        }
    }
}

/// Per-persona coefficient table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonaTable {
    pub mobile_content_creator: f64,
    pub youtube_creator: f64,
    pub professional_creator: f64,
    pub general_user: f64,
}

impl PersonaTable {
    pub fn get(&self, persona: PersonaType) -> f64 {
        match persona {
            PersonaType::MobileContentCreator => self.mobile_content_creator,
            PersonaType::YoutubeCreator => self.youtube_creator,
            PersonaType::ProfessionalCreator => self.professional_creator,
            PersonaType::GeneralUser => self.general_user,
        }
    }
}

/// Heuristic constants used by the predictive models. The defaults are the
/// reference values; deployments may override any table from configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub lead_traffic_multiplier: TrafficTable,
    pub lead_persona_multiplier: PersonaTable,
    pub logit_intercept: f64,
    pub logit_lead_weight: f64,
    pub logit_traffic_weight: TrafficTable,
    pub logit_persona_weight: PersonaTable,
    pub ltv_base: PersonaTable,
    pub lead_points: LeadPoints,
    pub conversion_bonus: ConversionBonus,
    pub ltv_boost: LtvBoost,
    pub churn: ChurnWeights,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            lead_traffic_multiplier: TrafficTable {
                organic: 1.2,
                social: 1.0,
                paid: 0.9,
                referral: 1.1,
                direct: 1.3,
                email: 1.4,
            },
            lead_persona_multiplier: PersonaTable {
                mobile_content_creator: 1.3,
                youtube_creator: 1.2,
                professional_creator: 1.4,
                general_user: 1.0,
            },
            logit_intercept: -2.0,
            logit_lead_weight: 3.0,
            logit_traffic_weight: TrafficTable {
                organic: 0.4,
                social: 0.2,
                paid: 0.1,
                referral: 0.3,
                direct: 0.6,
                email: 0.8,
            },
            logit_persona_weight: PersonaTable {
                mobile_content_creator: 0.5,
                youtube_creator: 0.3,
                professional_creator: 0.7,
                general_user: 0.0,
            },
            ltv_base: PersonaTable {
                mobile_content_creator: 89.0,
                youtube_creator: 149.0,
                professional_creator: 299.0,
                general_user: 79.0,
            },
            lead_points: LeadPoints::default(),
            conversion_bonus: ConversionBonus::default(),
            ltv_boost: LtvBoost::default(),
            churn: ChurnWeights::default(),
        }
    }
}

/// Lead-score points per behavior signal, before the segment multipliers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LeadPoints {
    pub page_view: f64,
    pub minute_on_site: f64,
    /// Minutes beyond this earn nothing.
    pub max_scored_minutes: f64,
    /// Points for scrolling to 100%; partial depth earns pro rata.
    pub full_scroll: f64,
    pub form_interaction: f64,
    pub video_watched: f64,
    pub asset_downloaded: f64,
    pub social_share: f64,
    pub return_visit: f64,
}

impl Default for LeadPoints {
    fn default() -> Self {
        Self {
            page_view: 2.0,
            minute_on_site: 5.0,
            max_scored_minutes: 10.0,
            full_scroll: 10.0,
            form_interaction: 15.0,
            video_watched: 20.0,
            asset_downloaded: 25.0,
            social_share: 10.0,
            return_visit: 15.0,
        }
    }
}

/// Additive logit bonuses of the conversion model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConversionBonus {
    pub form_interaction: f64,
    pub video_watched: f64,
    pub asset_downloaded: f64,
    pub long_visit: f64,
    pub long_visit_ms: u64,
}

impl Default for ConversionBonus {
    fn default() -> Self {
        Self {
            form_interaction: 1.0,
            video_watched: 0.8,
            asset_downloaded: 1.2,
            long_visit: 0.6,
            long_visit_ms: 180_000,
        }
    }
}

/// Lifetime-value multipliers applied above engagement thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LtvBoost {
    pub engagement_above: f64,
    pub engagement_multiplier: f64,
    pub adoption_above: f64,
    pub adoption_multiplier: f64,
    pub social_sharing_multiplier: f64,
}

impl Default for LtvBoost {
    fn default() -> Self {
        Self {
            engagement_above: 7.0,
            engagement_multiplier: 1.3,
            adoption_above: 0.6,
            adoption_multiplier: 1.2,
            social_sharing_multiplier: 1.1,
        }
    }
}

/// Churn risk points: risk factors add, protective behaviors subtract.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChurnWeights {
    pub dormant_after_trial_days: i64,
    pub dormant_inactive_days: i64,
    pub dormant: i32,
    pub low_usage_below: u32,
    pub low_usage: i32,
    pub low_frequency_below: f64,
    pub low_frequency: i32,
    pub no_content: i32,
    pub support_tickets_above: u32,
    pub support_burden: i32,
    pub invited_team: i32,
    pub customized_settings: i32,
    pub exported_content: i32,
}

impl Default for ChurnWeights {
    fn default() -> Self {
        Self {
            dormant_after_trial_days: 7,
            dormant_inactive_days: 3,
            dormant: 30,
            low_usage_below: 3,
            low_usage: 25,
            low_frequency_below: 0.5,
            low_frequency: 20,
            no_content: 35,
            support_tickets_above: 2,
            support_burden: 15,
            invited_team: 20,
            customized_settings: 10,
            exported_content: 15,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(path: Option<&str>) -> HooklabResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("HOOKLAB")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engines cannot run with.
    pub fn validate(&self) -> HooklabResult<()> {
        let level = self.experiments.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(HooklabError::Config(format!(
                "experiments.confidence_level must be in (0, 1), got {level}"
            )));
        }
        Ok(())
    }
}
