//! Bounded in-memory detection history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::DetectionBatch;

/// One recorded detection round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub avg_confidence: f64,
    /// Display names in detector order
    pub objects: Vec<String>,
}

impl HistoryEntry {
    pub fn from_batch(batch: &DetectionBatch) -> Self {
        Self {
            timestamp: Utc::now(),
            count: batch.len(),
            avg_confidence: batch.summary().avg_confidence,
            objects: batch.iter().map(|d| d.display_name()).collect(),
        }
    }
}

/// Most-recent-first ring of history entries.
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl DetectionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Record a batch, evicting the oldest entry once full.
    pub fn record(&mut self, batch: &DetectionBatch) {
        if self.limit == 0 {
            return;
        }
        self.entries.push_front(HistoryEntry::from_batch(batch));
        self.entries.truncate(self.limit);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl Default for DetectionHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
