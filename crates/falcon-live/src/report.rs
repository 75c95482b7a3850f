//! Model accuracy report loading.

use std::path::Path;

use falcon_models::AccuracyReport;
use tracing::info;

use crate::error::LiveResult;

/// Load the training-time accuracy report shown next to the live view.
pub fn load_accuracy_report(path: impl AsRef<Path>) -> LiveResult<AccuracyReport> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let report = AccuracyReport::from_json(&json)?;
    info!(
        path = %path.display(),
        classes = report.per_class_metrics.len(),
        "mAP@0.5 {:.1}%",
        report.headline_percent()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiveError;

    #[test]
    fn test_load_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(
            &path,
            r#"{"overall_metrics":{"mAP50":0.9,"mAP50_95":0.7,"precision":0.92,"recall":0.88},"per_class_metrics":{}}"#,
        )
        .unwrap();

        let report = load_accuracy_report(&path).unwrap();
        assert!((report.headline_percent() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_report_is_io_error() {
        let err = load_accuracy_report("/nonexistent/report.json").unwrap_err();
        assert!(matches!(err, LiveError::Io(_)));
    }
}
