//! Detection models.
//!
//! Field names follow the detector's JSON (`class`, `class_id`, `bbox`).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::ClassCatalog;

/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// One recognized object instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Detector class key, e.g. `Fire_Extinguisher`
    #[serde(rename = "class")]
    pub class_label: String,
    /// Detector class index; may fall outside the catalog
    pub class_id: i64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, class_id: i64, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.into(),
            class_id,
            confidence,
            bbox,
        }
    }

    /// Human-readable class name.
    pub fn display_name(&self) -> String {
        ClassCatalog::display_name(&self.class_label)
    }
}

/// All detections returned for one frame, in detector order.
///
/// A batch is replaced wholesale on every successful response; it is never
/// merged with a previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DetectionBatch(Vec<Detection>);

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self(detections)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.0
    }

    /// Summary statistics for display.
    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary::from_batch(self)
    }
}

impl From<Vec<Detection>> for DetectionBatch {
    fn from(detections: Vec<Detection>) -> Self {
        Self(detections)
    }
}

impl IntoIterator for DetectionBatch {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a DetectionBatch {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Display statistics for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionSummary {
    pub total: usize,
    pub avg_confidence: f64,
    pub highest_confidence: f64,
    pub lowest_confidence: f64,
    /// Occurrences per detector class key
    pub counts: BTreeMap<String, usize>,
}

impl DetectionSummary {
    pub fn from_batch(batch: &DetectionBatch) -> Self {
        if batch.is_empty() {
            return Self::default();
        }

        let mut counts = BTreeMap::new();
        let mut sum = 0.0;
        let mut highest = f64::MIN;
        let mut lowest = f64::MAX;

        for d in batch {
            *counts.entry(d.class_label.clone()).or_insert(0) += 1;
            sum += d.confidence;
            highest = highest.max(d.confidence);
            lowest = lowest.min(d.confidence);
        }

        Self {
            total: batch.len(),
            avg_confidence: sum / batch.len() as f64,
            highest_confidence: highest,
            lowest_confidence: lowest,
            counts,
        }
    }
}
