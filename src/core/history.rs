//! Transition log.
//!
//! Keeps a bounded record of the transitions a machine performed, for
//! diagnostics and tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::path::HistoryMode;

/// Record of a single transition.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{HistoryMode, TransitionRecord};
/// use chrono::Utc;
///
/// let record = TransitionRecord {
///     target: "machine.active".to_string(),
///     mode: HistoryMode::Fresh,
///     exited: vec!["machine.inactive".to_string()],
///     entered: vec!["machine.active".to_string()],
///     timestamp: Utc::now(),
/// };
/// assert!(record.changed());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Path of the resolved target node
    pub target: String,
    /// History modifier used for the transition
    pub mode: HistoryMode,
    /// Paths that were deactivated, in pre-order
    pub exited: Vec<String>,
    /// Paths that were activated, in pre-order
    pub entered: Vec<String>,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    /// True when the transition changed the active configuration.
    pub fn changed(&self) -> bool {
        !self.exited.is_empty() || !self.entered.is_empty()
    }
}

/// Bounded, ordered log of transitions. Oldest records are dropped first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionLog {
    capacity: usize,
    records: VecDeque<TransitionRecord>,
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TransitionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::new(),
        }
    }

    pub fn record(&mut self, record: TransitionRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Duration between the first and last retained record.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.front(), self.records.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }
}
