//! Detector seam used by the live loop.

use async_trait::async_trait;
use falcon_models::{DetectionBatch, Frame};

use crate::error::TransportResult;

/// Anything that can turn a frame into a detection batch.
///
/// [`crate::DetectionClient`] is the production implementation; tests plug
/// in scripted detectors.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> TransportResult<DetectionBatch>;

    /// Aggregate usage stats, if the backend exposes any.
    async fn stats(&self) -> TransportResult<Option<serde_json::Value>> {
        Ok(None)
    }
}
