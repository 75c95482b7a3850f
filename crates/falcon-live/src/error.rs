//! Live loop error types.

use falcon_client::TransportError;
use falcon_models::FrameError;
use falcon_overlay::OverlayError;
use thiserror::Error;

use crate::speech::SpeechError;

pub type LiveResult<T> = Result<T, LiveError>;

/// Errors surfaced outside the loop (setup, sources, output).
///
/// Inside the loop nothing is fatal: capture, transport and speech
/// failures are logged and the next tick carries on.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LiveError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
