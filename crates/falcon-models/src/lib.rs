//! Shared data models for Falcon live detection.
//!
//! This crate provides Serde-serializable types for:
//! - Detections, bounding boxes and per-frame batches
//! - The static safety-equipment class catalog
//! - Encoded camera frames
//! - Accuracy reports and the bounded detection history

pub mod catalog;
pub mod detection;
pub mod frame;
pub mod history;
pub mod report;

// Re-export common types
pub use catalog::{ClassCatalog, Color, SafetyClass, UnknownClass, FALLBACK_EMOJI};
pub use detection::{BoundingBox, Detection, DetectionBatch, DetectionSummary};
pub use frame::{Frame, FrameError, FrameResult};
pub use history::{DetectionHistory, HistoryEntry};
pub use report::{AccuracyReport, ClassMetrics, OverallMetrics};
