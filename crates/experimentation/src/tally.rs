//! Per-variant visitor and conversion counters.

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionTally {
    pub test_id: String,
    pub variant: String,
    /// Distinct visitors assigned to the variant.
    pub visitors: u64,
    /// Distinct visitors who reached the tracked goal at least once.
    pub conversions: u64,
}

impl ConversionTally {
    pub fn conversion_rate(&self) -> f64 {
        if self.visitors > 0 {
            self.conversions as f64 / self.visitors as f64
        } else {
            0.0
        }
    }
}

/// Monotonic counters keyed by (test, variant). Conversions are deduplicated
/// per (test, visitor) so repeated goal events never double count.
#[derive(Default)]
pub(crate) struct TallyBook {
    counts: DashMap<(String, String), ConversionTally>,
    converted: DashSet<(String, String)>,
}

impl TallyBook {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_visitor(&self, test_id: &str, variant: &str) {
        self.entry(test_id, variant).visitors += 1;
    }

    /// Returns `true` when this call counted the conversion.
    pub(crate) fn record_conversion(&self, test_id: &str, variant: &str, visitor_id: &str) -> bool {
        if !self
            .converted
            .insert((test_id.to_string(), visitor_id.to_string()))
        {
            return false;
        }
        self.entry(test_id, variant).conversions += 1;
        true
    }

    pub(crate) fn get(&self, test_id: &str, variant: &str) -> ConversionTally {
        self.counts
            .get(&(test_id.to_string(), variant.to_string()))
            .map(|t| t.clone())
            .unwrap_or_else(|| ConversionTally {
                test_id: test_id.to_string(),
                variant: variant.to_string(),
                ..Default::default()
            })
    }

    fn entry(
        &self,
        test_id: &str,
        variant: &str,
    ) -> dashmap::mapref::one::RefMut<'_, (String, String), ConversionTally> {
        self.counts
            .entry((test_id.to_string(), variant.to_string()))
            .or_insert_with(|| ConversionTally {
                test_id: test_id.to_string(),
                variant: variant.to_string(),
                ..Default::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_dedup() {
        let book = TallyBook::new();
        book.record_visitor("hero", "a");
        book.record_visitor("hero", "a");

        assert!(book.record_conversion("hero", "a", "u1"));
        assert!(!book.record_conversion("hero", "a", "u1"));
        assert!(book.record_conversion("hero", "a", "u2"));

        let tally = book.get("hero", "a");
        assert_eq!(tally.visitors, 2);
        assert_eq!(tally.conversions, 2);
        assert_eq!(tally.conversion_rate(), 1.0);
    }

    #[test]
    fn test_unknown_variant_is_empty() {
        let book = TallyBook::new();
        let tally = book.get("hero", "missing");
        assert_eq!(tally.visitors, 0);
        assert_eq!(tally.conversion_rate(), 0.0);
    }
}
