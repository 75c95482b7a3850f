//! Model accuracy report, loaded once at startup for display.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregate validation metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OverallMetrics {
    #[serde(rename = "mAP50")]
    pub map50: f64,
    #[serde(rename = "mAP50_95")]
    pub map50_95: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Per-class validation metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "mAP50")]
    pub map50: f64,
}

/// `test_accuracy_results.json` contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccuracyReport {
    #[serde(default)]
    pub overall_metrics: OverallMetrics,
    /// Keyed by detector class key
    #[serde(default)]
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

impl AccuracyReport {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Headline accuracy (mAP@50) as a percentage.
    pub fn headline_percent(&self) -> f64 {
        self.overall_metrics.map50 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let json = r#"{
            "overall_metrics": {"mAP50": 0.746, "mAP50_95": 0.52, "precision": 0.846, "recall": 0.69, "extra": 1},
            "per_class_metrics": {
                "Fire_Alarm": {"precision": 0.9, "recall": 0.8, "mAP50": 0.85}
            },
            "model": "yolov8m"
        }"#;
        let report = AccuracyReport::from_json(json).unwrap();
        assert!((report.headline_percent() - 74.6).abs() < 1e-9);
        assert_eq!(report.per_class_metrics["Fire_Alarm"].recall, 0.8);
    }

    #[test]
    fn test_missing_fields_default() {
        let report = AccuracyReport::from_json(r#"{"overall_metrics": {"precision": 0.5}}"#).unwrap();
        assert_eq!(report.overall_metrics.map50, 0.0);
        assert!(report.per_class_metrics.is_empty());
    }
}
