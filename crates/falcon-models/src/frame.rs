//! Encoded camera frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for frame acquisition.
pub type FrameResult<T> = Result<T, FrameError>;

/// Errors raised while acquiring or encoding a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// No frame yet (camera warming up, empty slot). Not an error for the loop.
    #[error("No frame available")]
    Unavailable,

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Frame source failed: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Camera-not-ready condition, skipped silently by the loop.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FrameError::Unavailable)
    }
}

/// A single JPEG still sampled from a live source.
///
/// `width`/`height` are the source's native pixel dimensions, which is the
/// coordinate space detections come back in.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(jpeg: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            jpeg,
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    /// `data:image/jpeg;base64,...` form expected by the detector.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.jpeg))
    }
}
