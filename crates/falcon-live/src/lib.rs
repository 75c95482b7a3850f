//! Live safety-equipment detection.
//!
//! This crate wires a frame source to the remote detector and keeps a
//! live overlay plus spoken summaries up to date:
//! - `DetectionLoop`: capture/measure timers, response application
//! - `AnnouncementEngine`: debounced voice summaries
//! - Frame sources (cameras, stills, directories), speech backends and
//!   overlay output

pub mod announce;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod fps;
pub mod frame_source;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod report;
pub mod speech;
pub mod task;

pub use announce::{format_announcement, pluralize, AnnouncementEngine, ClassCounts, Consideration};
pub use camera::{is_camera_uri, CameraConfig, CameraFormat, CameraSource, PixelFormat, SyntheticCamera};
pub use config::{LiveConfig, ResponseOrdering, VoiceConfig};
pub use controller::{DetectionLoop, LiveSnapshot, LoopSession};
pub use error::{LiveError, LiveResult};
pub use fps::FpsMeter;
pub use frame_source::{
    encode_jpeg, DirectorySource, FramePublisher, FrameSource, LatestFrameSlot, StillImageSource,
};
pub use output::OverlayWriter;
pub use report::load_accuracy_report;
pub use speech::{
    CommandSpeech, LogSpeech, SpeechEngine, SpeechError, SpeechResult, SpeechSink, Utterance,
};
pub use task::RepeatingTask;
