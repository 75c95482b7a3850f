//! Client for the remote Falcon detection service.
//!
//! The service is an opaque HTTP detector: frames go in as data-URL JPEGs,
//! detection batches come back. This crate also exposes the upload, health
//! and stats endpoints the service offers.

pub mod client;
pub mod detector;
pub mod error;
pub mod types;

pub use client::{ClientConfig, DetectionClient};
pub use detector::Detector;
pub use error::{TransportError, TransportResult};
pub use types::{AnnotatedImage, DetectResponse, HealthResponse, UploadResponse};
