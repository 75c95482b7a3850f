//! Error types for overlay output.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors that can occur while rasterising or saving overlays.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Invalid font file: {0}")]
    InvalidFont(PathBuf),

    #[error("Background is {actual_w}x{actual_h}, overlay is {expected_w}x{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
