//! Pure evaluation of alert rules against a snapshot.

use hooklab_core::config::AlertRule;
use hooklab_core::types::{Comparison, MetricsSnapshot};

pub fn is_triggered(rule: &AlertRule, snapshot: &MetricsSnapshot) -> bool {
    if snapshot.visitors < rule.min_visitors {
        return false;
    }
    let value = snapshot.metric(rule.metric);
    match rule.comparison {
        Comparison::Below => value < rule.threshold,
        Comparison::Above => value > rule.threshold,
    }
}

/// Rules whose condition holds, in rule order.
pub fn triggered<'a>(rules: &'a [AlertRule], snapshot: &MetricsSnapshot) -> Vec<&'a AlertRule> {
    rules.iter().filter(|r| is_triggered(r, snapshot)).collect()
}

pub fn alert_message(rule: &AlertRule, snapshot: &MetricsSnapshot) -> String {
    format!(
        "{} (current {:.3}, threshold {})",
        rule.message,
        snapshot.metric(rule.metric),
        rule.threshold
    )
}
