//! Derivation of a [`MetricsSnapshot`] from raw counters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hooklab_core::types::{MetricsSnapshot, RawCounters};

/// Session length that earns the full duration share of engagement.
const ENGAGED_SESSION_SECS: f64 = 180.0;

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator / denominator as f64
    } else {
        0.0
    }
}

pub fn derive_snapshot(counters: &RawCounters, captured_at: DateTime<Utc>) -> MetricsSnapshot {
    let bounce_rate = ratio(counters.bounced_sessions as f64, counters.sessions);
    let session_duration_secs = ratio(counters.total_session_duration_secs, counters.sessions);
    let scroll_depth_pct = ratio(counters.total_scroll_depth_pct, counters.sessions);

    // 0–10: scroll depth 40%, session length 40%, non-bounce 20%.
    let engagement_score = if counters.sessions > 0 {
        let score = scroll_depth_pct / 100.0 * 4.0
            + (session_duration_secs / ENGAGED_SESSION_SECS).min(1.0) * 4.0
            + (1.0 - bounce_rate) * 2.0;
        score.clamp(0.0, 10.0)
    } else {
        0.0
    };

    MetricsSnapshot {
        id: Uuid::new_v4(),
        visitors: counters.visitors,
        conversions: counters.conversions,
        conversion_rate: ratio(counters.conversions as f64, counters.visitors),
        revenue: counters.revenue,
        revenue_per_visitor: ratio(counters.revenue, counters.visitors),
        page_load_time_ms: ratio(counters.total_page_load_ms, counters.page_loads),
        bounce_rate,
        session_duration_secs,
        scroll_depth_pct,
        engagement_score,
        active_tests: counters.active_tests,
        significant_tests: counters.significant_tests,
        captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_rates() {
        let counters = RawCounters {
            visitors: 1000,
            conversions: 50,
            revenue: 450.0,
            sessions: 1200,
            bounced_sessions: 480,
            total_session_duration_secs: 1200.0 * 90.0,
            total_scroll_depth_pct: 1200.0 * 50.0,
            page_loads: 2000,
            total_page_load_ms: 2000.0 * 1500.0,
            active_tests: 3,
            significant_tests: 1,
        };
        let snap = derive_snapshot(&counters, Utc::now());
        assert_eq!(snap.conversion_rate, 0.05);
        assert_eq!(snap.revenue_per_visitor, 0.45);
        assert_eq!(snap.bounce_rate, 0.4);
        assert_eq!(snap.session_duration_secs, 90.0);
        assert_eq!(snap.page_load_time_ms, 1500.0);
        // 0.5*4 + 0.5*4 + 0.6*2
        assert!((snap.engagement_score - 5.2).abs() < 1e-9);
        assert_eq!(snap.active_tests, 3);
    }

    #[test]
    fn test_zero_denominators() {
        let snap = derive_snapshot(&RawCounters::default(), Utc::now());
        assert_eq!(snap.conversion_rate, 0.0);
        assert_eq!(snap.revenue_per_visitor, 0.0);
        assert_eq!(snap.page_load_time_ms, 0.0);
        assert_eq!(snap.engagement_score, 0.0);
    }
}
