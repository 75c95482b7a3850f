//! Detection service request/response types.

use falcon_models::{Detection, DetectionBatch};
use serde::{Deserialize, Serialize};

/// Body for `POST /predict/base64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base64Request {
    /// Data-URL encoded JPEG still
    pub image: String,
}

/// Response from `POST /predict/base64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_detections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_time_ms: Option<f64>,
}

impl DetectResponse {
    pub fn into_batch(self) -> DetectionBatch {
        DetectionBatch::new(self.detections)
    }
}

/// Annotated image returned by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedImage {
    /// Data URL of the server-side annotated JPEG
    pub annotated: String,
}

/// Response from `POST /predict/image`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub detections: Vec<Detection>,
    pub image: AnnotatedImage,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        (self.status == "healthy" || self.status == "ok") && self.model_loaded != Some(false)
    }
}
