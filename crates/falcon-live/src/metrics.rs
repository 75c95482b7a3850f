//! Prometheus metrics for the live loop.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve metrics on `addr` (`GET /metrics`).
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_CAPTURED_TOTAL: &str = "falcon_frames_captured_total";
    pub const DETECTIONS_APPLIED_TOTAL: &str = "falcon_detections_applied_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "falcon_detection_failures_total";
    pub const STALE_RESPONSES_TOTAL: &str = "falcon_stale_responses_total";
    pub const FPS: &str = "falcon_fps";
    pub const ANNOUNCEMENTS_TOTAL: &str = "falcon_announcements_total";
    pub const CAMERA_FRAMES_TOTAL: &str = "falcon_camera_frames_total";
    pub const CAMERA_ERRORS_TOTAL: &str = "falcon_camera_errors_total";
}

pub fn record_frame_captured() {
    counter!(names::FRAMES_CAPTURED_TOTAL).increment(1);
}

pub fn record_batch_applied(detections: usize) {
    let labels = [("empty", (detections == 0).to_string())];
    counter!(names::DETECTIONS_APPLIED_TOTAL, &labels).increment(1);
}

pub fn record_detection_failure(kind: &'static str) {
    counter!(names::DETECTION_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_stale_response(reason: &'static str) {
    counter!(names::STALE_RESPONSES_TOTAL, "reason" => reason).increment(1);
}

pub fn set_fps(fps: u32) {
    gauge!(names::FPS).set(fps as f64);
}

pub fn record_announcement() {
    counter!(names::ANNOUNCEMENTS_TOTAL).increment(1);
}

pub fn record_camera_frame() {
    counter!(names::CAMERA_FRAMES_TOTAL).increment(1);
}

pub fn record_camera_error() {
    counter!(names::CAMERA_ERRORS_TOTAL).increment(1);
}
