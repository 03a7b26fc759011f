//! Rolling alert log. Only the most recent alerts are kept; older entries
//! are discarded, not hidden.

use std::collections::VecDeque;

use parking_lot::Mutex;

use hooklab_core::types::Alert;

pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 50;

pub struct AlertLog {
    entries: Mutex<VecDeque<Alert>>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append and trim in one critical section.
    pub fn push(&self, alert: Alert) {
        let mut entries = self.entries.lock();
        entries.push_back(alert);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Alerts oldest first.
    pub fn entries(&self) -> Vec<Alert> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_LOG_CAPACITY)
    }
}
